//! Design-matrix construction for a model specification
//!
//! Numeric predictors map to one column each. Categorical predictors are
//! dummy-coded against the first level observed in the training rows, so an
//! evaluation row carrying a level the training rows never saw cannot be
//! encoded and the prediction fails.

use crate::dataset::{ColumnData, Dataset};
use crate::error::{FeatswarmError, Result};
use ndarray::Array2;

#[derive(Debug, Clone)]
enum Term {
    Numeric {
        name: String,
    },
    Dummy {
        name: String,
        /// Training levels coded as indicator columns, reference level excluded
        coded: Vec<u32>,
        /// Every level observed in the training rows, reference level included
        observed: Vec<u32>,
    },
}

impl Term {
    fn width(&self) -> usize {
        match self {
            Term::Numeric { .. } => 1,
            Term::Dummy { coded, .. } => coded.len(),
        }
    }
}

/// Encoder fitted on the training rows of one fold
#[derive(Debug, Clone)]
pub struct DesignEncoder {
    terms: Vec<Term>,
    intercept: bool,
    n_columns: usize,
}

impl DesignEncoder {
    /// Encoder for regression engines: leading intercept column, every
    /// factor must show at least two levels in the training rows
    pub fn for_regression(data: &Dataset, predictors: &[String], rows: &[usize]) -> Result<Self> {
        Self::fit(data, predictors, rows, true, 2)
    }

    /// Encoder for tree engines: no intercept, single-level factors allowed
    /// (they contribute no columns)
    pub fn for_trees(data: &Dataset, predictors: &[String], rows: &[usize]) -> Result<Self> {
        Self::fit(data, predictors, rows, false, 1)
    }

    fn fit(
        data: &Dataset,
        predictors: &[String],
        rows: &[usize],
        intercept: bool,
        min_levels: usize,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(FeatswarmError::ValidationError(
                "Cannot fit a design on zero rows".to_string(),
            ));
        }

        let mut terms = Vec::with_capacity(predictors.len());
        for name in predictors {
            let term = match data.column(name)?.data() {
                ColumnData::Numeric(_) => Term::Numeric { name: name.clone() },
                ColumnData::Categorical { codes, levels } => {
                    let mut present = vec![false; levels.len()];
                    for &r in rows {
                        present[codes[r] as usize] = true;
                    }
                    let observed: Vec<u32> = present
                        .iter()
                        .enumerate()
                        .filter(|(_, p)| **p)
                        .map(|(code, _)| code as u32)
                        .collect();

                    if observed.len() < min_levels {
                        return Err(FeatswarmError::ComputationError(format!(
                            "Factor '{}' has {} level(s) in the training rows",
                            name,
                            observed.len()
                        )));
                    }

                    Term::Dummy {
                        name: name.clone(),
                        coded: observed[1..].to_vec(),
                        observed,
                    }
                }
            };
            terms.push(term);
        }

        let n_columns = usize::from(intercept) + terms.iter().map(Term::width).sum::<usize>();

        Ok(Self {
            terms,
            intercept,
            n_columns,
        })
    }

    /// Width of the encoded matrix
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Encode the given rows
    pub fn transform(&self, data: &Dataset, rows: &[usize]) -> Result<Array2<f64>> {
        let mut x = Array2::<f64>::zeros((rows.len(), self.n_columns));
        let mut offset = 0;

        if self.intercept {
            x.column_mut(0).fill(1.0);
            offset = 1;
        }

        for term in &self.terms {
            match term {
                Term::Numeric { name } => {
                    let values = data.numeric(name)?;
                    for (i, &r) in rows.iter().enumerate() {
                        let v = values[r];
                        if !v.is_finite() {
                            return Err(FeatswarmError::ComputationError(format!(
                                "Non-finite value in '{}' at row {}",
                                name, r
                            )));
                        }
                        x[[i, offset]] = v;
                    }
                }
                Term::Dummy {
                    name,
                    coded,
                    observed,
                } => {
                    let column = data.column(name)?;
                    let (codes, levels) = match column.data() {
                        ColumnData::Categorical { codes, levels } => (codes, levels),
                        ColumnData::Numeric(_) => {
                            return Err(FeatswarmError::DataError(format!(
                                "Column '{}' changed type after fitting",
                                name
                            )))
                        }
                    };

                    for (i, &r) in rows.iter().enumerate() {
                        let code = codes[r];
                        if observed.binary_search(&code).is_err() {
                            return Err(FeatswarmError::UnseenLevel {
                                column: name.clone(),
                                level: levels[code as usize].clone(),
                            });
                        }
                        if let Ok(j) = coded.binary_search(&code) {
                            x[[i, offset + j]] = 1.0;
                        }
                    }
                }
            }
            offset += term.width();
        }

        Ok(x)
    }
}
