//! Selection run configuration

use crate::error::{FeatswarmError, Result};
use crate::optimizer::PsoConfig;
use crate::training::{ForestConfig, MixedEffectsConfig, ModelKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything one selection run needs besides the data.
///
/// Swarm parameters are flattened, so a JSON file reads
/// `{"response": "yield", "swarm_size": 30, "inertia": 0.6, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Response column
    pub response: String,

    /// Metadata columns that are never candidates (site, year, ...)
    pub exclude: Vec<String>,

    /// Grouping column; required by the mixed-effects engine and never a
    /// candidate
    pub group: Option<String>,

    pub model_kind: ModelKind,

    /// Cross-validation folds `k`
    pub folds: usize,

    /// Penalty per selected variable, as a multiple of the response's
    /// standard deviation
    pub penalty_factor: f64,

    /// Top-N sizes of the correlation-seeded particles
    pub warm_start_sizes: Vec<usize>,

    /// Seed of the fold assignment
    pub cv_seed: u64,

    #[serde(flatten)]
    pub pso: PsoConfig,

    pub forest: ForestConfig,

    pub mixed: MixedEffectsConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            response: String::new(),
            exclude: Vec::new(),
            group: None,
            model_kind: ModelKind::Linear,
            folds: 5,
            penalty_factor: 0.05,
            warm_start_sizes: vec![5, 10],
            cv_seed: 42,
            pso: PsoConfig::default(),
            forest: ForestConfig::default(),
            mixed: MixedEffectsConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Configuration for a response column, defaults elsewhere
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_exclude(mut self, columns: Vec<String>) -> Self {
        self.exclude = columns;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_model_kind(mut self, kind: ModelKind) -> Self {
        self.model_kind = kind;
        self
    }

    pub fn with_folds(mut self, k: usize) -> Self {
        self.folds = k;
        self
    }

    pub fn with_penalty_factor(mut self, factor: f64) -> Self {
        self.penalty_factor = factor;
        self
    }

    pub fn with_warm_start_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.warm_start_sizes = sizes;
        self
    }

    pub fn with_swarm_size(mut self, n: usize) -> Self {
        self.pso.swarm_size = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.pso.max_iterations = n;
        self
    }

    /// Seed for the swarm and warm start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.pso.seed = seed;
        self
    }

    pub fn with_cv_seed(mut self, seed: u64) -> Self {
        self.cv_seed = seed;
        self
    }

    pub fn with_pso(mut self, pso: PsoConfig) -> Self {
        self.pso = pso;
        self
    }

    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.forest = forest;
        self
    }

    /// Checks that need no data. Column- and size-dependent checks run when
    /// the engine sees the dataset.
    pub fn validate(&self) -> Result<()> {
        if self.response.trim().is_empty() {
            return Err(FeatswarmError::ConfigError(
                "Response column is not set".to_string(),
            ));
        }
        if self.folds < 2 {
            return Err(FeatswarmError::ConfigError(format!(
                "Fold count must be at least 2, got {}",
                self.folds
            )));
        }
        if !(self.penalty_factor.is_finite() && self.penalty_factor >= 0.0) {
            return Err(FeatswarmError::ConfigError(format!(
                "Penalty factor must be a finite value >= 0, got {}",
                self.penalty_factor
            )));
        }
        if self.warm_start_sizes.iter().any(|&n| n == 0) {
            return Err(FeatswarmError::ConfigError(
                "Warm-start sizes must be positive".to_string(),
            ));
        }
        if self.model_kind.requires_group() && self.group.is_none() {
            return Err(FeatswarmError::ConfigError(format!(
                "Model kind '{}' requires a grouping column",
                self.model_kind
            )));
        }
        if self.group.as_deref() == Some(self.response.as_str()) {
            return Err(FeatswarmError::ConfigError(
                "Grouping column cannot be the response".to_string(),
            ));
        }
        self.pso.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flattened_json() {
        let json = r#"{
            "response": "yield",
            "model_kind": "mixed_effects",
            "group": "site",
            "swarm_size": 12,
            "inertia": 0.6,
            "forest": {"n_estimators": 10}
        }"#;
        let config: SelectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.response, "yield");
        assert_eq!(config.model_kind, ModelKind::MixedEffects);
        assert_eq!(config.pso.swarm_size, 12);
        assert!((config.pso.inertia - 0.6).abs() < 1e-12);
        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.min_samples_leaf, 5);
        assert_eq!(config.folds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let ok = SelectionConfig::new("y");
        assert!(ok.validate().is_ok());
        assert!(SelectionConfig::default().validate().is_err());
        assert!(ok.clone().with_folds(1).validate().is_err());
        assert!(ok.clone().with_swarm_size(0).validate().is_err());
        assert!(ok.clone().with_max_iterations(0).validate().is_err());
        assert!(ok.clone().with_penalty_factor(-0.1).validate().is_err());
        assert!(ok.clone().with_warm_start_sizes(vec![0]).validate().is_err());
        assert!(ok.clone().with_model_kind(ModelKind::MixedEffects).validate().is_err());
        assert!(ok.with_group("y").validate().is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SelectionConfig::new("yield")
            .with_exclude(vec!["year".to_string()])
            .with_swarm_size(7);
        config.save_json(&path).unwrap();

        let loaded = SelectionConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.exclude, vec!["year".to_string()]);
        assert_eq!(loaded.pso.swarm_size, 7);
    }
}
