//! In-memory dataset used by the selection loop
//!
//! Columns are stored column-wise: numeric columns as `Array1<f64>`,
//! categorical columns as level codes plus the level labels. Levels are
//! fixed when the column is built, so every fold of a cross-validation
//! shares one code space.

mod candidates;
mod column;

pub use candidates::CandidateVariableSet;
pub use column::{Column, ColumnData};

use crate::error::{FeatswarmError, Result};
use ndarray::Array1;
use polars::prelude::{DataFrame, DataType};
use std::collections::HashMap;

/// A cleaned, column-oriented dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from columns of equal length with unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut index = HashMap::with_capacity(columns.len());

        for (i, column) in columns.iter().enumerate() {
            if column.len() != n_rows {
                return Err(FeatswarmError::ShapeError {
                    expected: format!("{} rows in column '{}'", n_rows, column.name()),
                    actual: format!("{} rows", column.len()),
                });
            }
            if index.insert(column.name().to_string(), i).is_some() {
                return Err(FeatswarmError::DataError(format!(
                    "Duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self {
            columns,
            index,
            n_rows,
        })
    }

    /// Convert a polars DataFrame
    ///
    /// Integer and float columns become numeric (nulls become NaN), every
    /// other dtype is cast to string and becomes categorical. A null in a
    /// categorical column is a data error.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let name = series.name().to_string();

            let column = if is_numeric_dtype(series.dtype()) {
                let cast = series.cast(&DataType::Float64)?;
                let values: Vec<f64> = cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                Column::numeric(name, values)
            } else {
                let cast = series.cast(&DataType::String)?;
                let mut labels = Vec::with_capacity(cast.len());
                for value in cast.str()?.into_iter() {
                    match value {
                        Some(label) => labels.push(label.to_string()),
                        None => {
                            return Err(FeatswarmError::DataError(format!(
                                "Column '{}' has missing categorical values",
                                name
                            )))
                        }
                    }
                }
                Column::categorical(name, &labels)
            };

            columns.push(column);
        }

        Self::new(columns)
    }

    /// Number of records
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// All columns in load order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in load order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Whether a column exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| FeatswarmError::FeatureNotFound(name.to_string()))
    }

    /// Borrow a numeric column
    pub fn numeric(&self, name: &str) -> Result<&Array1<f64>> {
        match self.column(name)?.data() {
            ColumnData::Numeric(values) => Ok(values),
            ColumnData::Categorical { .. } => Err(FeatswarmError::DataError(format!(
                "Column '{}' is categorical, expected numeric",
                name
            ))),
        }
    }

    /// Gather the values of a numeric column at the given rows
    pub fn numeric_rows(&self, name: &str, rows: &[usize]) -> Result<Array1<f64>> {
        let values = self.numeric(name)?;
        Ok(rows.iter().map(|&r| values[r]).collect())
    }

    /// Dense integer codes for a grouping column
    ///
    /// Categorical columns return their level codes. Numeric columns (an
    /// integer site id, say) are mapped to codes in order of first
    /// appearance; NaN is a data error.
    pub fn group_codes(&self, name: &str) -> Result<Vec<u32>> {
        match self.column(name)?.data() {
            ColumnData::Categorical { codes, .. } => Ok(codes.clone()),
            ColumnData::Numeric(values) => {
                let mut seen: HashMap<u64, u32> = HashMap::new();
                let mut codes = Vec::with_capacity(values.len());
                for &v in values.iter() {
                    if v.is_nan() {
                        return Err(FeatswarmError::DataError(format!(
                            "Grouping column '{}' has missing values",
                            name
                        )));
                    }
                    // normalise -0.0 so it shares a code with 0.0
                    let key = if v == 0.0 { 0u64 } else { v.to_bits() };
                    let next = seen.len() as u32;
                    codes.push(*seen.entry(key).or_insert(next));
                }
                Ok(codes)
            }
        }
    }

    /// Candidate predictors: every column except the response, the grouping
    /// key and the excluded metadata columns, in load order
    pub fn candidate_variables(
        &self,
        response: &str,
        group: Option<&str>,
        exclude: &[String],
    ) -> Result<CandidateVariableSet> {
        self.column(response)?;
        if let Some(g) = group {
            self.column(g)?;
        }
        for name in exclude {
            self.column(name)?;
        }

        let names = self
            .columns
            .iter()
            .map(|c| c.name())
            .filter(|&name| {
                name != response && Some(name) != group && !exclude.iter().any(|e| e == name)
            })
            .map(str::to_string)
            .collect();

        Ok(CandidateVariableSet::new(names))
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("yield", vec![1.0, 2.0, 3.0, 4.0]),
            Column::numeric("rain", vec![10.0, 20.0, 30.0, 40.0]),
            Column::categorical("soil", &["clay", "sand", "clay", "loam"]),
            Column::numeric("site", vec![7.0, 7.0, 9.0, 9.0]),
            Column::numeric("year", vec![2020.0, 2021.0, 2020.0, 2021.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_candidates_exclude_response_group_and_metadata() {
        let data = sample();
        let candidates = data
            .candidate_variables("yield", Some("site"), &["year".to_string()])
            .unwrap();
        assert_eq!(candidates.names(), &["rain".to_string(), "soil".to_string()]);
    }

    #[test]
    fn test_unknown_excluded_column_is_an_error() {
        let data = sample();
        let result = data.candidate_variables("yield", None, &["nope".to_string()]);
        assert!(matches!(result, Err(FeatswarmError::FeatureNotFound(_))));
    }

    #[test]
    fn test_numeric_group_codes() {
        let data = sample();
        assert_eq!(data.group_codes("site").unwrap(), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_dataframe() {
        let df = df!(
            "y" => &[1.0, 2.0, 3.0],
            "n" => &[1i64, 2, 3],
            "c" => &["a", "b", "a"]
        )
        .unwrap();

        let data = Dataset::from_dataframe(&df).unwrap();
        assert_eq!(data.n_rows(), 3);
        assert!(data.column("n").unwrap().is_numeric());
        assert!(!data.column("c").unwrap().is_numeric());
        assert_eq!(data.column("c").unwrap().levels().unwrap(), &["a", "b"]);
    }
}
