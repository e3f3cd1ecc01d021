//! Ordered candidate predictor set

use serde::{Deserialize, Serialize};

/// Ordered candidate variable names.
///
/// Particle dimension `i` always refers to `names()[i]`; the order never
/// changes during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVariableSet {
    names: Vec<String>,
}

impl CandidateVariableSet {
    /// Wrap an ordered list of names
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Number of candidates (the search-space dimension)
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in particle-index order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name at a particle index
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Particle index of a name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterate over names in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names at the given indices, in index order
    pub fn select(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.names.get(i).cloned())
            .collect()
    }
}
