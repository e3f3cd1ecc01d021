//! Random forest regression backend

use super::config::ForestConfig;
use super::decision_tree::RegressionTree;
use super::design::DesignEncoder;
use super::{FittedModel, ModelBackend, ModelKind, ModelSpec};
use crate::dataset::Dataset;
use crate::error::{FeatswarmError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Bagged regression trees
#[derive(Debug, Clone, Default)]
pub struct RandomForestBackend {
    config: ForestConfig,
}

impl RandomForestBackend {
    /// Create a backend with the given forest settings
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }
}

/// Fitted forest
#[derive(Debug, Clone)]
pub struct ForestFit {
    encoder: DesignEncoder,
    trees: Vec<RegressionTree>,
}

impl ForestFit {
    /// Grow the forest on the given rows. Trees are built in parallel;
    /// tree `i` draws from its own generator seeded with `seed + i`, so the
    /// result does not depend on scheduling.
    pub fn fit(spec: &ModelSpec, data: &Dataset, rows: &[usize], config: &ForestConfig) -> Result<Self> {
        let encoder = DesignEncoder::for_trees(data, &spec.predictors, rows)?;
        let x = encoder.transform(data, rows)?;
        let y = data.numeric_rows(&spec.response, rows)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(FeatswarmError::ComputationError(format!(
                "Non-finite values in response '{}'",
                spec.response
            )));
        }

        let trees = grow_forest(&x, &y, config)?;
        Ok(Self { encoder, trees })
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn default_max_features(n_features: usize) -> usize {
    (n_features / 3).max(1)
}

fn grow_forest(x: &Array2<f64>, y: &Array1<f64>, config: &ForestConfig) -> Result<Vec<RegressionTree>> {
    let n_samples = x.nrows();
    let max_features = config
        .max_features
        .unwrap_or_else(|| default_max_features(x.ncols()));

    (0..config.n_estimators.max(1))
        .into_par_iter()
        .map(|tree_idx| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(tree_idx as u64));

            // Bootstrap sample
            let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

            let mut tree = RegressionTree::new()
                .with_max_depth(config.max_depth)
                .with_min_samples_leaf(config.min_samples_leaf)
                .with_max_features(max_features);
            tree.fit(x, y, &sample, &mut rng)?;
            Ok(tree)
        })
        .collect()
}

impl FittedModel for ForestFit {
    /// Mean of the per-tree predictions
    fn predict(&self, data: &Dataset, rows: &[usize]) -> Result<Array1<f64>> {
        let x = self.encoder.transform(data, rows)?;
        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(&x))
            .collect::<Result<_>>()?;

        let mut sum = Array1::<f64>::zeros(rows.len());
        for pred in &per_tree {
            sum += pred;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

impl ModelBackend for RandomForestBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit_model(&self, spec: &ModelSpec, data: &Dataset, rows: &[usize]) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(ForestFit::fit(spec, data, rows, &self.config)?))
    }
}
