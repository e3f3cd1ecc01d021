//! Model configuration

use crate::error::FeatswarmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression engine used inside cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ordinary least squares
    Linear,
    /// Random-intercept linear mixed model
    MixedEffects,
    /// Bagged regression trees
    RandomForest,
}

impl ModelKind {
    /// Whether the engine needs a grouping variable
    pub fn requires_group(&self) -> bool {
        matches!(self, ModelKind::MixedEffects)
    }

    /// Stable identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::MixedEffects => "mixed_effects",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = FeatswarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "linear" | "lm" | "ols" => Ok(ModelKind::Linear),
            "mixed_effects" | "mixed" | "lmm" => Ok(ModelKind::MixedEffects),
            "random_forest" | "rf" | "forest" => Ok(ModelKind::RandomForest),
            other => Err(FeatswarmError::ConfigError(format!(
                "Unknown model kind '{}' (expected linear, mixed_effects or random_forest)",
                other
            ))),
        }
    }
}

/// Random forest parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Maximum tree depth (`None` = grow until leaves are pure or minimal)
    pub max_depth: Option<usize>,
    /// Features tried per split (`None` = max(1, p / 3))
    pub max_features: Option<usize>,
    /// Base seed; tree `i` uses `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            min_samples_leaf: 5,
            max_depth: None,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set minimum leaf size
    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set base seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Mixed-model fitting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixedEffectsConfig {
    /// EM iteration cap; exceeding it is a fit failure
    pub max_iter: usize,
    /// Relative convergence tolerance
    pub tol: f64,
}

impl Default for MixedEffectsConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tol: 1e-6,
        }
    }
}
