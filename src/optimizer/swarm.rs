//! Particles and swarm state

use super::config::{BoundaryPolicy, PsoConfig};
use crate::error::{FeatswarmError, Result};

/// One particle: position in [0, 1]^d, velocity and personal best
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    /// Fitness at the current position
    pub fitness: f64,
    pub best_position: Vec<f64>,
    pub best_fitness: f64,
}

impl Particle {
    /// Particle at rest at `position`, not yet evaluated
    pub fn new(position: Vec<f64>) -> Self {
        let d = position.len();
        Self {
            best_position: position.clone(),
            position,
            velocity: vec![0.0; d],
            fitness: f64::INFINITY,
            best_fitness: f64::INFINITY,
        }
    }

    /// `v = w·v + c1·r1·(pbest − x) + c2·r2·(gbest − x)`, each component
    /// clamped to `[−vmax, vmax]`
    pub fn update_velocity(&mut self, global_best: &[f64], r1: &[f64], r2: &[f64], config: &PsoConfig) {
        let vmax = config.max_velocity;
        for j in 0..self.velocity.len() {
            let x = self.position[j];
            let v = config.inertia * self.velocity[j]
                + config.cognitive * r1[j] * (self.best_position[j] - x)
                + config.social * r2[j] * (global_best[j] - x);
            self.velocity[j] = v.clamp(-vmax, vmax);
        }
    }

    /// `x += v`, then bring the position back into [0, 1]
    pub fn apply_velocity(&mut self, boundary: BoundaryPolicy) {
        for (x, v) in self.position.iter_mut().zip(self.velocity.iter_mut()) {
            *x += *v;
            if boundary == BoundaryPolicy::Reflect {
                if *x > 1.0 {
                    *x = 2.0 - *x;
                    *v = -*v;
                } else if *x < 0.0 {
                    *x = -*x;
                    *v = -*v;
                }
            }
            *x = x.clamp(0.0, 1.0);
        }
    }

    /// Record the fitness of the current position. Returns whether the
    /// personal best strictly improved.
    pub fn record(&mut self, fitness: f64) -> bool {
        self.fitness = fitness;
        if fitness < self.best_fitness {
            self.best_fitness = fitness;
            self.best_position.clone_from(&self.position);
            true
        } else {
            false
        }
    }
}

/// Fixed-size particle collection with the global best
#[derive(Debug, Clone)]
pub struct Swarm {
    particles: Vec<Particle>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

impl Swarm {
    /// Swarm at rest on the given positions (components clipped into [0, 1])
    pub fn new(positions: Vec<Vec<f64>>) -> Result<Self> {
        let dimensions = positions
            .first()
            .map(Vec::len)
            .ok_or_else(|| FeatswarmError::ValidationError("Swarm needs at least one particle".to_string()))?;
        if dimensions == 0 {
            return Err(FeatswarmError::ValidationError(
                "Search space has zero dimensions".to_string(),
            ));
        }

        let mut particles = Vec::with_capacity(positions.len());
        for mut position in positions {
            if position.len() != dimensions {
                return Err(FeatswarmError::ShapeError {
                    expected: format!("{} dimensions", dimensions),
                    actual: format!("{} dimensions", position.len()),
                });
            }
            if position.iter().any(|x| !x.is_finite()) {
                return Err(FeatswarmError::ValidationError(
                    "Initial position has non-finite components".to_string(),
                ));
            }
            position.iter_mut().for_each(|x| *x = x.clamp(0.0, 1.0));
            particles.push(Particle::new(position));
        }

        let best_position = particles[0].position.clone();
        Ok(Self {
            particles,
            best_position,
            best_fitness: f64::INFINITY,
        })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.best_position.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn best_position(&self) -> &[f64] {
        &self.best_position
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Adopt the lowest personal best, scanning in particle order. Only a
    /// strictly lower fitness replaces the incumbent.
    pub fn update_global_best(&mut self) -> bool {
        let mut improved = false;
        for p in &self.particles {
            if p.best_fitness < self.best_fitness {
                self.best_fitness = p.best_fitness;
                self.best_position.clone_from(&p.best_position);
                improved = true;
            }
        }
        improved
    }

    /// Current positions, in particle order
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.particles.iter().map(|p| p.position.clone()).collect()
    }
}
