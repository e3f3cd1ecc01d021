//! Correlation-seeded swarm initialization

use crate::dataset::{CandidateVariableSet, Dataset};
use crate::error::{FeatswarmError, Result};
use crate::utils::pearson;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A numeric candidate and its absolute correlation with the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedVariable {
    pub name: String,
    /// Position in the candidate set (and in particle vectors)
    pub index: usize,
    pub abs_correlation: f64,
}

/// Builds the initial swarm: one one-hot seed per top-N size, the rest
/// uniform on [0, 1]^d
#[derive(Debug, Clone)]
pub struct WarmStartInitializer {
    seed: u64,
}

impl WarmStartInitializer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Numeric candidates by descending |r| with the response. Categorical
    /// candidates are left out; a zero-variance column scores 0. Equal
    /// scores keep candidate order.
    pub fn correlation_ranking(
        data: &Dataset,
        candidates: &CandidateVariableSet,
        response: &str,
    ) -> Result<Vec<RankedVariable>> {
        let y = data.numeric(response)?;
        let mut ranking = Vec::with_capacity(candidates.len());

        for (index, name) in candidates.iter().enumerate() {
            let column = data.column(name)?;
            if !column.is_numeric() {
                continue;
            }
            let x = data.numeric(name)?;
            let r = pearson(x.view(), y.view()).map_or(0.0, f64::abs);
            ranking.push(RankedVariable {
                name: name.to_string(),
                index,
                abs_correlation: if r.is_finite() { r } else { 0.0 },
            });
        }

        ranking.sort_by(|a, b| b.abs_correlation.total_cmp(&a.abs_correlation));
        Ok(ranking)
    }

    /// One seed per size: 1.0 at the indices of the top-N ranked
    /// variables, 0.0 elsewhere
    pub fn seed_positions(ranking: &[RankedVariable], dimensions: usize, sizes: &[usize]) -> Vec<Vec<f64>> {
        sizes
            .iter()
            .map(|&n| {
                let mut position = vec![0.0; dimensions];
                for var in ranking.iter().take(n) {
                    position[var.index] = 1.0;
                }
                position
            })
            .collect()
    }

    /// `swarm_size` starting positions: the seeds first (truncated to the
    /// swarm size), then uniform draws
    pub fn initial_positions(
        &self,
        data: &Dataset,
        candidates: &CandidateVariableSet,
        response: &str,
        sizes: &[usize],
        swarm_size: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let ranking = Self::correlation_ranking(data, candidates, response)?;
        if let Some(&n) = sizes.iter().find(|&&n| n > ranking.len()) {
            return Err(FeatswarmError::ConfigError(format!(
                "Warm-start size {} exceeds the {} numeric candidate variables",
                n,
                ranking.len()
            )));
        }
        let dimensions = candidates.len();

        let mut positions = Self::seed_positions(&ranking, dimensions, sizes);
        positions.truncate(swarm_size);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let unit = Uniform::new_inclusive(0.0, 1.0);
        while positions.len() < swarm_size {
            positions.push((0..dimensions).map(|_| unit.sample(&mut rng)).collect());
        }

        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn data() -> Dataset {
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        Dataset::new(vec![
            Column::numeric("y", y.clone()),
            Column::numeric("weak", (0..10).map(|i| ((i * 3) % 4) as f64).collect::<Vec<_>>()),
            Column::categorical("soil", &["a", "b", "a", "b", "a", "b", "a", "b", "a", "b"]),
            Column::numeric("flat", vec![1.0; 10]),
            Column::numeric("strong", y.iter().map(|v| -2.0 * v).collect::<Vec<_>>()),
        ])
        .unwrap()
    }

    #[test]
    fn test_ranking_orders_numeric_candidates() {
        let data = data();
        let candidates = data.candidate_variables("y", None, &[]).unwrap();
        let ranking = WarmStartInitializer::correlation_ranking(&data, &candidates, "y").unwrap();

        let names: Vec<&str> = ranking.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["strong", "weak", "flat"]);
        assert!((ranking[0].abs_correlation - 1.0).abs() < 1e-12);
        assert_eq!(ranking[2].abs_correlation, 0.0);
        assert_eq!(ranking[0].index, 3);
    }

    #[test]
    fn test_seeds_are_one_hot_top_n() {
        let data = data();
        let candidates = data.candidate_variables("y", None, &[]).unwrap();
        let positions = WarmStartInitializer::new(0)
            .initial_positions(&data, &candidates, "y", &[1, 2], 5)
            .unwrap();

        assert_eq!(positions.len(), 5);
        assert_eq!(positions[0], vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(positions[1], vec![1.0, 0.0, 0.0, 1.0]);
        assert!(positions[2..]
            .iter()
            .flatten()
            .all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn test_seeds_truncated_to_swarm_size() {
        let data = data();
        let candidates = data.candidate_variables("y", None, &[]).unwrap();
        let positions = WarmStartInitializer::new(0)
            .initial_positions(&data, &candidates, "y", &[1, 2, 3], 2)
            .unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1], vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_size_beyond_numeric_candidates_rejected() {
        let data = data();
        let candidates = data.candidate_variables("y", None, &[]).unwrap();
        // four candidates, but "soil" is categorical and never ranked
        let result = WarmStartInitializer::new(0).initial_positions(&data, &candidates, "y", &[4], 5);
        assert!(matches!(result, Err(FeatswarmError::ConfigError(_))));
    }

    #[test]
    fn test_initial_positions_deterministic() {
        let data = data();
        let candidates = data.candidate_variables("y", None, &[]).unwrap();
        let init = WarmStartInitializer::new(11);
        let a = init.initial_positions(&data, &candidates, "y", &[1], 6).unwrap();
        let b = init.initial_positions(&data, &candidates, "y", &[1], 6).unwrap();
        assert_eq!(a, b);
    }
}
