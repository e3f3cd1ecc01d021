//! One feature-selection run from configuration to report

use super::config::SelectionConfig;
use super::fitness::{dynamic_penalty, FitnessEvaluator};
use super::warm_start::{RankedVariable, WarmStartInitializer};
use crate::dataset::{CandidateVariableSet, Dataset};
use crate::error::{FeatswarmError, Result};
use crate::optimizer::{EngineState, PsoEngine};
use crate::training::{create_backend, CrossValidator, ModelKind, SENTINEL_FAILURE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Whether the best subset found could actually be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Stable,
    /// Even the best subset carries the failure sentinel
    Unstable,
}

/// Result of a selection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionReport {
    pub response: String,
    pub model_kind: ModelKind,
    pub status: SelectionStatus,
    pub selected: Vec<String>,
    pub n_candidates: usize,
    pub fitness: f64,
    /// `None` when the run is unstable
    pub cv_error: Option<f64>,
    pub penalty_per_variable: f64,
    pub best_position: Vec<f64>,
    pub initial_best_fitness: f64,
    pub trace: Vec<f64>,
    pub iterations: usize,
    pub state: EngineState,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub elapsed_secs: f64,
}

impl SelectionReport {
    pub fn is_stable(&self) -> bool {
        self.status == SelectionStatus::Stable
    }

    /// Write as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            SelectionStatus::Unstable => {
                writeln!(
                    f,
                    "UNSTABLE: no candidate subset could be cross-validated with {} for '{}'",
                    self.model_kind, self.response
                )?;
                writeln!(
                    f,
                    "  {} of {} evaluations failed; best fitness is the failure sentinel ({:e})",
                    self.failed_evaluations, self.evaluations, self.fitness
                )?;
            }
            SelectionStatus::Stable => {
                writeln!(
                    f,
                    "Selected {} of {} variables for '{}' ({}):",
                    self.selected.len(),
                    self.n_candidates,
                    self.response,
                    self.model_kind
                )?;
                for name in &self.selected {
                    writeln!(f, "  - {}", name)?;
                }
                if let Some(cv) = self.cv_error {
                    writeln!(f, "  CV MAE:  {:.6}", cv)?;
                }
                writeln!(f, "  Fitness: {:.6}", self.fitness)?;
            }
        }
        write!(
            f,
            "  {} iterations, {}, {} evaluations",
            self.iterations, self.state, self.evaluations
        )
    }
}

/// Runs PSO feature selection on a dataset
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    config: SelectionConfig,
}

impl SelectionEngine {
    /// Create an engine; configuration errors surface here
    pub fn new(config: SelectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Candidate variables, after the data-dependent checks
    pub fn candidates(&self, data: &Dataset) -> Result<CandidateVariableSet> {
        let cfg = &self.config;
        let candidates = data.candidate_variables(&cfg.response, cfg.group.as_deref(), &cfg.exclude)?;

        if candidates.is_empty() {
            return Err(FeatswarmError::ConfigError(
                "No candidate variables left after excluding the response, group and metadata columns"
                    .to_string(),
            ));
        }
        // seeds draw from the correlation ranking, which holds numeric
        // candidates only
        let numeric = candidates
            .iter()
            .filter(|name| data.column(name).map_or(false, |c| c.is_numeric()))
            .count();
        if let Some(&n) = cfg.warm_start_sizes.iter().find(|&&n| n > numeric) {
            return Err(FeatswarmError::ConfigError(format!(
                "Warm-start size {} exceeds the {} numeric candidate variables",
                n, numeric
            )));
        }

        let response = data.column(&cfg.response)?;
        if !response.is_numeric() {
            return Err(FeatswarmError::ConfigError(format!(
                "Response '{}' must be numeric, found {}",
                cfg.response,
                response.type_name()
            )));
        }
        if data.numeric(&cfg.response)?.iter().any(|v| !v.is_finite()) {
            return Err(FeatswarmError::DataError(format!(
                "Response '{}' has missing or non-finite values",
                cfg.response
            )));
        }
        if data.n_rows() < cfg.folds {
            return Err(FeatswarmError::ConfigError(format!(
                "{} records cannot be split into {} folds",
                data.n_rows(),
                cfg.folds
            )));
        }
        if let Some(group) = &cfg.group {
            if cfg.model_kind.requires_group() {
                data.group_codes(group)?;
            }
        }

        Ok(candidates)
    }

    /// Correlation ranking of the numeric candidates
    pub fn rank(&self, data: &Dataset) -> Result<Vec<RankedVariable>> {
        let candidates = self.candidates(data)?;
        WarmStartInitializer::correlation_ranking(data, &candidates, &self.config.response)
    }

    /// Run the swarm and report the best subset
    pub fn run(&self, data: &Dataset) -> Result<SelectionReport> {
        let cfg = &self.config;
        let start = Instant::now();
        let candidates = self.candidates(data)?;
        let n_candidates = candidates.len();
        let penalty = dynamic_penalty(data, &cfg.response, cfg.penalty_factor)?;

        info!(
            response = %cfg.response,
            model = %cfg.model_kind,
            candidates = n_candidates,
            records = data.n_rows(),
            folds = cfg.folds,
            penalty,
            "starting feature selection"
        );

        let backend = create_backend(cfg.model_kind, &cfg.forest, &cfg.mixed);
        let evaluator = FitnessEvaluator::new(
            data,
            candidates.clone(),
            cfg.response.clone(),
            CrossValidator::new(backend),
            cfg.folds,
            cfg.cv_seed,
        )?
        .with_group(cfg.group.clone())
        .with_complexity_penalty(penalty);

        // warm start draws from its own stream so it never mirrors the
        // velocity draws
        let initial = WarmStartInitializer::new(cfg.pso.seed.wrapping_add(1)).initial_positions(
            data,
            &candidates,
            &cfg.response,
            &cfg.warm_start_sizes,
            cfg.pso.swarm_size,
        )?;

        let mut engine = PsoEngine::new(cfg.pso.clone())?;
        // failures rank below every fittable subset, whatever the response scale
        let result = engine.run(initial, |x| {
            let evaluation = evaluator.evaluate_detailed(x);
            if evaluation.is_failure() {
                f64::INFINITY
            } else {
                evaluation.fitness
            }
        })?;

        let evaluations = evaluator.evaluations();
        let failed_evaluations = evaluator.failures();
        let best = evaluator.evaluate_detailed(&result.best_position);

        let status = if best.is_failure() {
            warn!(
                failed = failed_evaluations,
                evaluations, "best subset is unstable under cross-validation"
            );
            SelectionStatus::Unstable
        } else {
            info!(
                selected = best.selected.len(),
                fitness = best.fitness,
                "feature selection complete"
            );
            SelectionStatus::Stable
        };

        Ok(SelectionReport {
            response: cfg.response.clone(),
            model_kind: cfg.model_kind,
            status,
            selected: best.selected,
            n_candidates,
            fitness: best.fitness,
            cv_error: best.cv_error,
            penalty_per_variable: penalty,
            best_position: result.best_position,
            initial_best_fitness: reported(result.initial_best_fitness),
            trace: result.trace.into_iter().map(reported).collect(),
            iterations: result.iterations,
            state: result.state,
            evaluations,
            failed_evaluations,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Failed evaluations reach the swarm as +inf; reports carry the sentinel
fn reported(fitness: f64) -> f64 {
    if fitness == f64::INFINITY {
        SENTINEL_FAILURE
    } else {
        fitness
    }
}
