//! Particle swarm optimization
//!
//! The search space is the unit hypercube: component `i` of a position is
//! the relaxed inclusion weight of candidate variable `i`.

mod config;
mod pso;
mod swarm;

pub use config::{BoundaryPolicy, PsoConfig};
pub use pso::{EngineState, PsoEngine, PsoResult};
pub use swarm::{Particle, Swarm};
