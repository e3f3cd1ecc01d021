//! Model backends and cross-validation
//!
//! Provides the fit/predict capability used by the fitness evaluator:
//! - Linear regression (OLS)
//! - Random-intercept linear mixed model
//! - Random forest regression
//!
//! Every engine fails the same way: a fit that cannot be produced becomes
//! [`FitResult::Failed`] and a prediction that cannot be produced becomes
//! [`ModelFailure`]. Callers never see why.

mod config;
mod design;
mod linalg;
pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;
pub mod mixed_effects;
pub mod random_forest;

pub use config::{ForestConfig, MixedEffectsConfig, ModelKind};
pub use cross_validation::{CVResults, CrossValidator, FoldAssignment, FoldFailure, SENTINEL_FAILURE};
pub use decision_tree::RegressionTree;
pub use design::DesignEncoder;
pub use linalg::{Cholesky, LeastSquares};
pub use linear_models::LinearBackend;
pub use mixed_effects::MixedEffectsBackend;
pub use random_forest::RandomForestBackend;

use crate::dataset::Dataset;
use crate::error::Result;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Response, selected predictors and an optional grouping variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub response: String,
    pub predictors: Vec<String>,
    pub group: Option<String>,
}

impl ModelSpec {
    /// Create a spec without a grouping variable
    pub fn new(response: impl Into<String>, predictors: Vec<String>) -> Self {
        Self {
            response: response.into(),
            predictors,
            group: None,
        }
    }

    /// Attach a grouping variable for random-effects terms
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ ", self.response)?;
        if self.predictors.is_empty() {
            f.write_str("1")?;
        } else {
            f.write_str(&self.predictors.join(" + "))?;
        }
        if let Some(group) = &self.group {
            write!(f, " + (1 | {})", group)?;
        }
        Ok(())
    }
}

/// Marker for a fit or prediction that could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFailure;

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("model failure")
    }
}

impl std::error::Error for ModelFailure {}

/// A fitted, engine-specific model
pub trait FittedModel: Send + Sync + fmt::Debug {
    /// Predict the response for the given rows
    fn predict(&self, data: &Dataset, rows: &[usize]) -> Result<Array1<f64>>;
}

/// Outcome of [`ModelBackend::fit`]
#[derive(Debug)]
pub enum FitResult {
    Fitted(Box<dyn FittedModel>),
    Failed,
}

impl FitResult {
    /// Whether the fit failed
    pub fn is_failed(&self) -> bool {
        matches!(self, FitResult::Failed)
    }
}

/// Fit/predict capability of one model kind
pub trait ModelBackend: Send + Sync {
    /// Kind implemented by this backend
    fn kind(&self) -> ModelKind;

    /// Engine-specific fit on the given training rows
    fn fit_model(&self, spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> Result<Box<dyn FittedModel>>;

    /// Fit, converting any engine error into [`FitResult::Failed`]
    fn fit(&self, spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> FitResult {
        match self.fit_model(spec, data, rows) {
            Ok(model) => FitResult::Fitted(model),
            Err(err) => {
                debug!(kind = %self.kind(), spec = %spec, reason = %err, "fit failed");
                FitResult::Failed
            }
        }
    }

    /// Predict from a fit; failed fits, engine errors and non-finite
    /// predictions all become [`ModelFailure`]
    fn predict(
        &self,
        fit: &FitResult,
        data: &Dataset,
        rows: &[usize],
    ) -> std::result::Result<Array1<f64>, ModelFailure> {
        let model = match fit {
            FitResult::Fitted(model) => model,
            FitResult::Failed => return Err(ModelFailure),
        };

        match model.predict(data, rows) {
            Ok(pred) if pred.iter().all(|v| v.is_finite()) => Ok(pred),
            Ok(_) => {
                debug!(kind = %self.kind(), "prediction produced non-finite values");
                Err(ModelFailure)
            }
            Err(err) => {
                debug!(kind = %self.kind(), reason = %err, "prediction failed");
                Err(ModelFailure)
            }
        }
    }
}

/// Backend for a model kind
pub fn create_backend(
    kind: ModelKind,
    forest: &ForestConfig,
    mixed: &MixedEffectsConfig,
) -> Box<dyn ModelBackend> {
    match kind {
        ModelKind::Linear => Box::new(LinearBackend::new()),
        ModelKind::MixedEffects => Box::new(MixedEffectsBackend::new(mixed.clone())),
        ModelKind::RandomForest => Box::new(RandomForestBackend::new(forest.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_display() {
        let spec = ModelSpec::new("yield", vec!["rain".to_string(), "soil".to_string()])
            .with_group("site");
        assert_eq!(spec.to_string(), "yield ~ rain + soil + (1 | site)");
    }

    #[test]
    fn test_create_backend_kinds() {
        let forest = ForestConfig::default();
        let mixed = MixedEffectsConfig::default();
        for kind in [ModelKind::Linear, ModelKind::MixedEffects, ModelKind::RandomForest] {
            assert_eq!(create_backend(kind, &forest, &mixed).kind(), kind);
        }
    }
}
