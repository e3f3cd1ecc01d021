//! Typed dataset columns

use ndarray::Array1;
use std::collections::BTreeSet;

/// Storage for one column
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// Continuous values
    Numeric(Array1<f64>),
    /// Finite label set; `codes[i]` indexes `levels`
    Categorical { codes: Vec<u32>, levels: Vec<String> },
}

/// A named column
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(Array1::from_vec(values.into())),
        }
    }

    /// Create a categorical column; levels are the sorted distinct labels
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, labels: &[S]) -> Self {
        let levels: Vec<String> = labels
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let codes = labels
            .iter()
            .map(|s| {
                // levels is sorted and contains every label
                levels
                    .binary_search_by(|l| l.as_str().cmp(s.as_ref()))
                    .unwrap_or_default() as u32
            })
            .collect();

        Self {
            name: name.into(),
            data: ColumnData::Categorical { codes, levels },
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column storage
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the column is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    /// Level labels of a categorical column
    pub fn levels(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Categorical { levels, .. } => Some(levels),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self.data {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Categorical { .. } => "categorical",
        }
    }
}
