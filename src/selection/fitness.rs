//! Subset fitness: cross-validated error plus a complexity penalty

use crate::dataset::{CandidateVariableSet, Dataset};
use crate::error::Result;
use crate::training::{CrossValidator, FoldAssignment, ModelSpec, SENTINEL_FAILURE};
use crate::utils::sample_std;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Inclusion threshold on a position component
pub const INCLUSION_THRESHOLD: f64 = 0.5;

/// Breakdown of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub selected: Vec<String>,
    /// Mean per-fold MAE; `None` when the subset is empty or a fold failed
    pub cv_error: Option<f64>,
    pub fitness: f64,
}

impl Evaluation {
    pub fn is_failure(&self) -> bool {
        self.cv_error.is_none()
    }
}

/// `penalty = stddev(response) * factor`, with the sample standard deviation
pub fn dynamic_penalty(data: &Dataset, response: &str, factor: f64) -> Result<f64> {
    let y = data.numeric(response)?;
    Ok(sample_std(y.view()).unwrap_or(0.0) * factor)
}

/// Scores particle positions for one run.
///
/// The fold assignment is computed once at construction, so every
/// evaluation in the run is compared on the same folds.
pub struct FitnessEvaluator<'a> {
    data: &'a Dataset,
    candidates: CandidateVariableSet,
    response: String,
    group: Option<String>,
    validator: CrossValidator,
    folds: FoldAssignment,
    penalty: f64,
    evaluations: AtomicUsize,
    failures: AtomicUsize,
}

impl<'a> FitnessEvaluator<'a> {
    /// Bind an evaluator to a dataset, candidates, response and engine.
    /// Folds are stratified with `cv_seed`.
    pub fn new(
        data: &'a Dataset,
        candidates: CandidateVariableSet,
        response: impl Into<String>,
        validator: CrossValidator,
        k: usize,
        cv_seed: u64,
    ) -> Result<Self> {
        let response = response.into();
        let folds = FoldAssignment::stratified(data.numeric(&response)?, k, cv_seed)?;

        Ok(Self {
            data,
            candidates,
            response,
            group: None,
            validator,
            folds,
            penalty: 0.0,
            evaluations: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    /// Grouping variable, attached to the model spec when the engine needs one
    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }

    /// Penalty added per selected variable
    pub fn with_complexity_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn candidates(&self) -> &CandidateVariableSet {
        &self.candidates
    }

    pub fn folds(&self) -> &FoldAssignment {
        &self.folds
    }

    /// Candidates whose component is at least 0.5
    pub fn decode(&self, position: &[f64]) -> Vec<String> {
        debug_assert_eq!(
            position.len(),
            self.candidates.len(),
            "position length must match the candidate count"
        );
        self.candidates
            .iter()
            .zip(position)
            .filter(|(_, x)| **x >= INCLUSION_THRESHOLD)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Fitness of a position
    pub fn evaluate(&self, position: &[f64]) -> f64 {
        self.evaluate_detailed(position).fitness
    }

    /// Fitness with the selected names and the CV error behind it
    pub fn evaluate_detailed(&self, position: &[f64]) -> Evaluation {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let selected = self.decode(position);

        if selected.is_empty() {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Evaluation {
                selected,
                cv_error: None,
                fitness: SENTINEL_FAILURE,
            };
        }

        let mut spec = ModelSpec::new(self.response.clone(), selected.clone());
        if self.validator.kind().requires_group() {
            if let Some(group) = &self.group {
                spec = spec.with_group(group.clone());
            }
        }

        let cv_error = match self.validator.cross_validate(&spec, self.data, &self.folds) {
            Ok(results) => results.mean_score,
            Err(failure) => {
                debug!(spec = %spec, fold = failure.fold, "subset failed cross-validation");
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Evaluation {
                    selected,
                    cv_error: None,
                    fitness: SENTINEL_FAILURE,
                };
            }
        };

        let fitness = cv_error + selected.len() as f64 * self.penalty;
        Evaluation {
            selected,
            cv_error: Some(cv_error),
            fitness,
        }
    }

    /// Evaluations so far
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Evaluations that came back as the failure sentinel
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}
