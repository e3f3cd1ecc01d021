//! Stratified k-fold cross-validation

use super::{ModelBackend, ModelKind, ModelSpec};
use crate::dataset::Dataset;
use crate::error::{FeatswarmError, Result};
use crate::utils::mean_absolute_error;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Score standing in for a subset that could not be evaluated. Large enough
/// to dominate any real error, finite so arithmetic on it stays well-defined.
pub const SENTINEL_FAILURE: f64 = 1e7;

/// Partition of record indices into k folds, stratified on the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldAssignment {
    /// Fold of each record
    fold_of: Vec<usize>,
    /// Record indices per fold, ascending
    folds: Vec<Vec<usize>>,
}

impl FoldAssignment {
    /// Stratified assignment.
    ///
    /// Records are ordered by response (index breaks ties) and cut into
    /// quantile bins; equal responses never straddle a bin boundary. Each bin
    /// is shuffled with the seed, then records are dealt round-robin. A record
    /// whose turn lands on a full fold goes to the lowest-index fold still
    /// below its target size. Targets are `n / k`, plus one for the first
    /// `n % k` folds.
    pub fn stratified(y: &Array1<f64>, k: usize, seed: u64) -> Result<Self> {
        let n = y.len();
        if k < 2 {
            return Err(FeatswarmError::ConfigError(format!(
                "Fold count must be at least 2, got {}",
                k
            )));
        }
        if n < k {
            return Err(FeatswarmError::ConfigError(format!(
                "Need at least as many records as folds ({} < {})",
                n, k
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| y[a].total_cmp(&y[b]).then(a.cmp(&b)));

        let n_bins = (n / k).clamp(2, 5).min(n);
        let mut cuts = Vec::with_capacity(n_bins + 1);
        cuts.push(0);
        for b in 1..n_bins {
            let mut cut = (b * n / n_bins).max(*cuts.last().unwrap_or(&0));
            while cut > 0 && cut < n && y[order[cut]] == y[order[cut - 1]] {
                cut += 1;
            }
            cuts.push(cut);
        }
        cuts.push(n);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for w in cuts.windows(2) {
            order[w[0]..w[1]].shuffle(&mut rng);
        }

        let base = n / k;
        let extra = n % k;
        let targets: Vec<usize> = (0..k).map(|f| if f < extra { base + 1 } else { base }).collect();

        let mut counts = vec![0usize; k];
        let mut fold_of = vec![0usize; n];
        for (cursor, &record) in order.iter().enumerate() {
            let mut fold = cursor % k;
            if counts[fold] >= targets[fold] {
                // counts sum to less than n here, so some fold is below target
                fold = (0..k).find(|&f| counts[f] < targets[f]).unwrap_or(fold);
            }
            counts[fold] += 1;
            fold_of[record] = fold;
        }

        let mut folds = vec![Vec::new(); k];
        for (record, &fold) in fold_of.iter().enumerate() {
            folds[fold].push(record);
        }

        Ok(Self { fold_of, folds })
    }

    /// Number of folds
    pub fn k(&self) -> usize {
        self.folds.len()
    }

    /// Number of records
    pub fn n_records(&self) -> usize {
        self.fold_of.len()
    }

    /// Record indices per fold
    pub fn folds(&self) -> &[Vec<usize>] {
        &self.folds
    }

    /// Fold of a record
    pub fn fold_of(&self, record: usize) -> Option<usize> {
        self.fold_of.get(record).copied()
    }

    /// Held-out records of fold `i`
    pub fn test_indices(&self, i: usize) -> &[usize] {
        &self.folds[i]
    }

    /// Training records of fold `i` (every other fold), ascending
    pub fn train_indices(&self, i: usize) -> Vec<usize> {
        self.fold_of
            .iter()
            .enumerate()
            .filter(|(_, f)| **f != i)
            .map(|(r, _)| r)
            .collect()
    }

    /// Size of each fold
    pub fn sizes(&self) -> Vec<usize> {
        self.folds.iter().map(Vec::len).collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Mean absolute error for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// The fold whose fit or prediction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldFailure {
    pub fold: usize,
}

impl fmt::Display for FoldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model failed on fold {}", self.fold)
    }
}

impl std::error::Error for FoldFailure {}

/// Runs a backend over the folds of a dataset
pub struct CrossValidator {
    backend: Box<dyn ModelBackend>,
}

impl CrossValidator {
    /// Create a cross-validator over a backend
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Model kind of the wrapped backend
    pub fn kind(&self) -> ModelKind {
        self.backend.kind()
    }

    /// Mean per-fold MAE of `spec`, or [`SENTINEL_FAILURE`] when any fold
    /// fails. Folds are computed from `seed`, so identical arguments give
    /// identical folds and an identical score.
    ///
    /// Errors only for an invalid fold setup (k < 2, fewer records than
    /// folds, unknown or non-numeric response).
    pub fn evaluate(&self, spec: &ModelSpec, data: &Dataset, k: usize, seed: u64) -> Result<f64> {
        let folds = FoldAssignment::stratified(data.numeric(&spec.response)?, k, seed)?;
        Ok(self.score(spec, data, &folds))
    }

    /// As [`evaluate`](Self::evaluate), on precomputed folds
    pub fn score(&self, spec: &ModelSpec, data: &Dataset, folds: &FoldAssignment) -> f64 {
        match self.cross_validate(spec, data, folds) {
            Ok(results) => results.mean_score,
            Err(failure) => {
                debug!(spec = %spec, fold = failure.fold, "subset failed cross-validation");
                SENTINEL_FAILURE
            }
        }
    }

    /// Per-fold scores. Stops at the first failing fold.
    pub fn cross_validate(
        &self,
        spec: &ModelSpec,
        data: &Dataset,
        folds: &FoldAssignment,
    ) -> std::result::Result<CVResults, FoldFailure> {
        let mut scores = Vec::with_capacity(folds.k());

        for fold in 0..folds.k() {
            let failure = FoldFailure { fold };
            let train = folds.train_indices(fold);
            let test = folds.test_indices(fold);

            let fit = self.backend.fit(spec, data, &train);
            let pred = self.backend.predict(&fit, data, test).map_err(|_| failure)?;
            let truth = data.numeric_rows(&spec.response, test).map_err(|_| failure)?;
            let mae = mean_absolute_error(truth.view(), pred.view()).ok_or(failure)?;

            scores.push(mae);
        }

        Ok(CVResults::from_scores(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::training::LinearBackend;

    fn response(n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| ((i * 37) % 23) as f64)
    }

    #[test]
    fn test_folds_partition_records() {
        let folds = FoldAssignment::stratified(&response(103), 5, 1).unwrap();
        let mut all: Vec<usize> = folds.folds().iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..103).collect::<Vec<_>>());
        assert_eq!(folds.sizes(), vec![21, 21, 21, 20, 20]);
    }

    #[test]
    fn test_folds_deterministic_for_seed() {
        let y = response(60);
        let a = FoldAssignment::stratified(&y, 4, 9).unwrap();
        let b = FoldAssignment::stratified(&y, 4, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_folds_handle_constant_response() {
        let y = Array1::from_elem(17, 2.5);
        let folds = FoldAssignment::stratified(&y, 3, 0).unwrap();
        let sizes = folds.sizes();
        assert_eq!(sizes.iter().sum::<usize>(), 17);
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_train_and_test_are_complementary() {
        let folds = FoldAssignment::stratified(&response(20), 4, 3).unwrap();
        let train = folds.train_indices(2);
        let test = folds.test_indices(2);
        assert_eq!(train.len() + test.len(), 20);
        assert!(test.iter().all(|r| !train.contains(r)));
        assert!(test.iter().all(|&r| folds.fold_of(r) == Some(2)));
    }

    #[test]
    fn test_invalid_fold_setup() {
        assert!(FoldAssignment::stratified(&response(10), 1, 0).is_err());
        assert!(FoldAssignment::stratified(&response(3), 5, 0).is_err());
    }

    #[test]
    fn test_exact_linear_relation_scores_zero() {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.0 + 2.0 * v).collect();
        let data = Dataset::new(vec![Column::numeric("y", y), Column::numeric("x", x)]).unwrap();
        let cv = CrossValidator::new(Box::new(LinearBackend::new()));
        let spec = ModelSpec::new("y", vec!["x".to_string()]);

        let score = cv.evaluate(&spec, &data, 5, 42).unwrap();
        assert!(score < 1e-8);
    }

    #[test]
    fn test_failing_fold_short_circuits() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 0.5).collect();
        let data = Dataset::new(vec![
            Column::numeric("y", y),
            Column::numeric("x", x.clone()),
            Column::numeric("x_copy", x),
        ])
        .unwrap();
        let cv = CrossValidator::new(Box::new(LinearBackend::new()));
        let spec = ModelSpec::new("y", vec!["x".to_string(), "x_copy".to_string()]);

        let folds = FoldAssignment::stratified(data.numeric("y").unwrap(), 4, 0).unwrap();
        assert_eq!(cv.cross_validate(&spec, &data, &folds), Err(FoldFailure { fold: 0 }));
        assert_eq!(cv.evaluate(&spec, &data, 4, 0).unwrap(), SENTINEL_FAILURE);
    }
}
