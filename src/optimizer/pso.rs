//! Particle swarm over a [0, 1]^d relaxation of subset inclusion

use super::config::PsoConfig;
use super::swarm::Swarm;
use crate::error::{FeatswarmError, Result};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Initialized,
    Running { iteration: usize },
    /// Stopped early: no global improvement within the patience window
    Converged,
    MaxIterReached,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Converged | EngineState::MaxIterReached)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Initialized => f.write_str("initialized"),
            EngineState::Running { iteration } => write!(f, "running (iteration {})", iteration),
            EngineState::Converged => f.write_str("converged"),
            EngineState::MaxIterReached => f.write_str("max iterations reached"),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsoResult {
    pub best_position: Vec<f64>,
    pub best_fitness: f64,
    /// Global best after evaluating the initial swarm
    pub initial_best_fitness: f64,
    /// Global best after each completed iteration; non-increasing
    pub trace: Vec<f64>,
    pub iterations: usize,
    pub state: EngineState,
    /// Objective calls, initial swarm included
    pub evaluations: usize,
}

/// PSO engine.
///
/// Random draws for the velocity update happen serially in particle order
/// before any evaluation, and best updates are a serial reduction over the
/// collected fitness values. A fixed seed therefore gives the same
/// trajectory whether evaluation runs in parallel or not.
pub struct PsoEngine {
    config: PsoConfig,
    state: EngineState,
    rng: ChaCha8Rng,
}

impl PsoEngine {
    /// Create an engine, validating the configuration
    pub fn new(config: PsoConfig) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            state: EngineState::Initialized,
            rng,
        })
    }

    pub fn config(&self) -> &PsoConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// `swarm_size` positions drawn uniformly from [0, 1]^d
    pub fn uniform_positions(&mut self, dimensions: usize) -> Vec<Vec<f64>> {
        let unit = Uniform::new_inclusive(0.0, 1.0);
        (0..self.config.swarm_size)
            .map(|_| (0..dimensions).map(|_| unit.sample(&mut self.rng)).collect())
            .collect()
    }

    /// Minimize `objective` starting from `initial` (one position per particle)
    pub fn run<F>(&mut self, initial: Vec<Vec<f64>>, objective: F) -> Result<PsoResult>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        if self.state != EngineState::Initialized {
            return Err(FeatswarmError::ValidationError(format!(
                "Engine already used (state: {})",
                self.state
            )));
        }
        if initial.len() != self.config.swarm_size {
            return Err(FeatswarmError::ShapeError {
                expected: format!("{} initial positions", self.config.swarm_size),
                actual: format!("{} initial positions", initial.len()),
            });
        }

        let mut swarm = Swarm::new(initial)?;
        let dimensions = swarm.dimensions();
        let unit = Uniform::new_inclusive(0.0, 1.0);

        let fitness = self.evaluate_all(&swarm.positions(), &objective);
        let mut evaluations = fitness.len();
        for (p, f) in swarm.particles_mut().iter_mut().zip(fitness) {
            p.record(f);
        }
        swarm.update_global_best();
        let initial_best_fitness = swarm.best_fitness();
        info!(
            particles = swarm.len(),
            dimensions,
            best = initial_best_fitness,
            "swarm initialized"
        );

        let mut trace = Vec::with_capacity(self.config.max_iterations);
        let mut stale = 0usize;
        let mut iterations = 0usize;

        for iteration in 1..=self.config.max_iterations {
            self.state = EngineState::Running { iteration };
            let global_best = swarm.best_position().to_vec();

            for p in swarm.particles_mut() {
                let r1: Vec<f64> = (0..dimensions).map(|_| unit.sample(&mut self.rng)).collect();
                let r2: Vec<f64> = (0..dimensions).map(|_| unit.sample(&mut self.rng)).collect();
                p.update_velocity(&global_best, &r1, &r2, &self.config);
                p.apply_velocity(self.config.boundary);
            }

            let fitness = self.evaluate_all(&swarm.positions(), &objective);
            evaluations += fitness.len();
            for (p, f) in swarm.particles_mut().iter_mut().zip(fitness) {
                p.record(f);
            }

            let previous = swarm.best_fitness();
            if swarm.update_global_best() {
                stale = 0;
                info!(iteration, best = swarm.best_fitness(), previous, "global best improved");
            } else {
                stale += 1;
            }

            trace.push(swarm.best_fitness());
            iterations = iteration;

            let mean = swarm.particles().iter().map(|p| p.fitness).sum::<f64>() / swarm.len() as f64;
            debug!(iteration, best = swarm.best_fitness(), mean, stale, "iteration complete");

            if self.config.early_stopping_patience.map_or(false, |patience| stale >= patience) {
                self.state = EngineState::Converged;
                info!(iteration, "no improvement within patience, stopping");
                break;
            }
        }

        if !self.state.is_terminal() {
            self.state = EngineState::MaxIterReached;
        }

        Ok(PsoResult {
            best_position: swarm.best_position().to_vec(),
            best_fitness: swarm.best_fitness(),
            initial_best_fitness,
            trace,
            iterations,
            state: self.state,
            evaluations,
        })
    }

    /// Fitness per position, in input order. NaN ranks worst.
    fn evaluate_all<F>(&self, positions: &[Vec<f64>], objective: &F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let score = |x: &Vec<f64>| {
            let f = objective(x.as_slice());
            if f.is_nan() {
                f64::INFINITY
            } else {
                f
            }
        };

        if self.config.parallel {
            positions.par_iter().map(score).collect()
        } else {
            positions.iter().map(score).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 0.3).powi(2)).sum()
    }

    #[test]
    fn test_run_improves_and_trace_non_increasing() {
        let config = PsoConfig::new().with_swarm_size(12).with_max_iterations(25);
        let mut engine = PsoEngine::new(config).unwrap();
        let initial = engine.uniform_positions(3);
        let result = engine.run(initial, sphere).unwrap();

        assert_eq!(result.trace.len(), 25);
        assert_eq!(result.state, EngineState::MaxIterReached);
        assert!(result.trace.windows(2).all(|w| w[1] <= w[0]));
        assert!(result.best_fitness <= result.initial_best_fitness);
        assert!(result.best_fitness < 0.05);
        assert_eq!(result.evaluations, 12 * 26);
        assert!(result.best_position.iter().all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn test_parallel_and_serial_trajectories_match() {
        let run = |parallel| {
            let config = PsoConfig::new()
                .with_swarm_size(8)
                .with_max_iterations(10)
                .with_seed(5)
                .with_parallel(parallel);
            let mut engine = PsoEngine::new(config).unwrap();
            let initial = engine.uniform_positions(4);
            engine.run(initial, sphere).unwrap()
        };
        let a = run(true);
        let b = run(false);
        assert_eq!(a.best_position, b.best_position);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_early_stopping_on_flat_objective() {
        let config = PsoConfig::new()
            .with_swarm_size(4)
            .with_max_iterations(50)
            .with_early_stopping(3);
        let mut engine = PsoEngine::new(config).unwrap();
        let initial = engine.uniform_positions(2);
        let result = engine.run(initial, |_| 1.0).unwrap();

        assert_eq!(result.state, EngineState::Converged);
        assert_eq!(result.iterations, 3);
        assert_eq!(engine.state(), EngineState::Converged);
    }

    #[test]
    fn test_wrong_swarm_size_rejected() {
        let mut engine = PsoEngine::new(PsoConfig::new().with_swarm_size(3)).unwrap();
        assert!(engine.run(vec![vec![0.5]], sphere).is_err());
    }

    #[test]
    fn test_engine_runs_once() {
        let mut engine = PsoEngine::new(PsoConfig::new().with_swarm_size(2).with_max_iterations(1)).unwrap();
        let initial = engine.uniform_positions(1);
        engine.run(initial.clone(), sphere).unwrap();
        assert!(engine.run(initial, sphere).is_err());
    }
}
