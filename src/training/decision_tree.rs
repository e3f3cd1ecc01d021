//! Regression tree used by the random forest

use crate::error::{FeatswarmError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// CART regression tree with squared-error splits and random feature
/// subsets per split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split (`None` = all)
    pub max_features: Option<usize>,
    n_features: usize,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Create an unfitted tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set features drawn per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Fit on the rows listed in `sample` (repeats allowed, as in a
    /// bootstrap draw)
    pub fn fit<R: Rng>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample: &[usize],
        rng: &mut R,
    ) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(FeatswarmError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if sample.is_empty() {
            return Err(FeatswarmError::ValidationError(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut indices = sample.to_vec();
        self.root = Some(self.build(x, y, &mut indices, 0, rng));
        Ok(self)
    }

    fn build<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &mut [usize],
        depth: usize,
        rng: &mut R,
    ) -> TreeNode {
        let n_samples = indices.len();
        let value = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        let should_stop = n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || self.n_features == 0;
        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(split) = self.find_best_split(x, y, indices, rng) else {
            return TreeNode::Leaf { value, n_samples };
        };

        // Partition in place: left block holds x <= threshold
        let mut mid = 0;
        for i in 0..n_samples {
            if x[[indices[i], split.feature_idx]] <= split.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        let (left_idx, right_idx) = indices.split_at_mut(mid);

        let left = Box::new(self.build(x, y, left_idx, depth + 1, rng));
        let right = Box::new(self.build(x, y, right_idx, depth + 1, rng));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn find_best_split<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let n_try = self.max_features.unwrap_or(self.n_features).min(self.n_features);
        let features = index::sample(rng, self.n_features, n_try).into_vec();

        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        // gains below this are rounding noise at the response's scale
        let min_gain = 1e-12 * indices.iter().map(|&i| y[i] * y[i]).sum::<f64>();
        let min_leaf = self.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature_idx in features {
            order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            // SSE reduction of a split equals
            // L²/nl + R²/nr − T²/n, with L, R, T the response sums
            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += y[order[pos]];
                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let here = x[[order[pos], feature_idx]];
                let next = x[[order[pos + 1], feature_idx]];
                if here >= next {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let gain = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64
                    - total_sum * total_sum / n as f64;

                if gain > min_gain && gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Predict one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(FeatswarmError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.root.is_none() {
            return Err(FeatswarmError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(FeatswarmError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_step_function_is_learned() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 5.0 });
        let sample: Vec<usize> = (0..20).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut tree = RegressionTree::new().with_min_samples_leaf(5);
        tree.fit(&x, &y, &sample, &mut rng).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert!((pred[0] - 1.0).abs() < 1e-12);
        assert!((pred[19] - 5.0).abs() < 1e-12);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_small_scale_response_still_splits() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1e-8 } else { 5e-8 });
        let sample: Vec<usize> = (0..20).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut tree = RegressionTree::new().with_min_samples_leaf(5);
        tree.fit(&x, &y, &sample, &mut rng).unwrap();

        assert_eq!(tree.n_leaves(), 2);
        let pred = tree.predict(&x).unwrap();
        assert!((pred[0] - 1e-8).abs() < 1e-20);
        assert!((pred[19] - 5e-8).abs() < 1e-20);
    }

    #[test]
    fn test_min_leaf_limits_growth() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(12, |i| i as f64);
        let sample: Vec<usize> = (0..12).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut tree = RegressionTree::new().with_min_samples_leaf(6);
        tree.fit(&x, &y, &sample, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_constant_response_is_single_leaf() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_elem(10, 3.0);
        let sample: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut tree = RegressionTree::new();
        tree.fit(&x, &y, &sample, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_unfitted_predict_errors() {
        let tree = RegressionTree::new();
        assert!(tree.predict(&Array2::zeros((1, 1))).is_err());
    }
}
