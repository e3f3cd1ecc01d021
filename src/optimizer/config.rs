//! Swarm configuration

use crate::error::{FeatswarmError, Result};
use serde::{Deserialize, Serialize};

/// What happens to a position component pushed outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Clamp to the nearest bound
    #[default]
    Clip,
    /// Mirror back inside and reverse that velocity component
    Reflect,
}

/// PSO parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PsoConfig {
    /// Number of particles
    pub swarm_size: usize,

    /// Iteration cap
    pub max_iterations: usize,

    /// Inertia weight `w`
    pub inertia: f64,

    /// Cognitive coefficient `c1` (pull toward the personal best)
    pub cognitive: f64,

    /// Social coefficient `c2` (pull toward the global best)
    pub social: f64,

    /// Velocity clamp `vmax`, applied per component
    pub max_velocity: f64,

    pub boundary: BoundaryPolicy,

    /// Seed for the velocity-update draws
    pub seed: u64,

    /// Stop after this many iterations without a global improvement
    pub early_stopping_patience: Option<usize>,

    /// Evaluate particles in parallel within an iteration
    pub parallel: bool,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            swarm_size: 20,
            max_iterations: 30,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            max_velocity: 0.5,
            boundary: BoundaryPolicy::Clip,
            seed: 42,
            early_stopping_patience: None,
            parallel: true,
        }
    }
}

impl PsoConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of particles
    pub fn with_swarm_size(mut self, n: usize) -> Self {
        self.swarm_size = n;
        self
    }

    /// Set iteration cap
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set inertia, cognitive and social coefficients
    pub fn with_coefficients(mut self, inertia: f64, cognitive: f64, social: f64) -> Self {
        self.inertia = inertia;
        self.cognitive = cognitive;
        self.social = social;
        self
    }

    /// Set velocity clamp
    pub fn with_max_velocity(mut self, vmax: f64) -> Self {
        self.max_velocity = vmax;
        self
    }

    /// Set boundary policy
    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    /// Set seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable early stopping
    pub fn with_early_stopping(mut self, patience: usize) -> Self {
        self.early_stopping_patience = Some(patience);
        self
    }

    /// Toggle parallel evaluation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.swarm_size < 1 {
            return Err(FeatswarmError::ConfigError(
                "Swarm size must be at least 1".to_string(),
            ));
        }
        if self.max_iterations < 1 {
            return Err(FeatswarmError::ConfigError(
                "Max iterations must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("inertia", self.inertia),
            ("cognitive", self.cognitive),
            ("social", self.social),
        ] {
            if !value.is_finite() {
                return Err(FeatswarmError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be finite".to_string(),
                });
            }
        }
        if !(self.max_velocity.is_finite() && self.max_velocity > 0.0) {
            return Err(FeatswarmError::InvalidParameter {
                name: "max_velocity".to_string(),
                value: self.max_velocity.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.early_stopping_patience == Some(0) {
            return Err(FeatswarmError::InvalidParameter {
                name: "early_stopping_patience".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PsoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.boundary, BoundaryPolicy::Clip);
        assert!((config.inertia - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(PsoConfig::new().with_swarm_size(0).validate().is_err());
        assert!(PsoConfig::new().with_max_iterations(0).validate().is_err());
        assert!(PsoConfig::new().with_max_velocity(0.0).validate().is_err());
        assert!(PsoConfig::new().with_early_stopping(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PsoConfig = serde_json::from_str(r#"{"swarm_size": 8, "boundary": "reflect"}"#).unwrap();
        assert_eq!(config.swarm_size, 8);
        assert_eq!(config.boundary, BoundaryPolicy::Reflect);
        assert_eq!(config.max_iterations, 30);
    }
}
