//! PSO feature selection
//!
//! Ties the pieces together: particle positions decode to variable subsets,
//! subsets are scored by cross-validated error plus a per-variable penalty,
//! and the swarm starts partly from correlation-ranked seeds.

mod config;
mod engine;
mod fitness;
mod warm_start;

pub use config::SelectionConfig;
pub use engine::{SelectionEngine, SelectionReport, SelectionStatus};
pub use fitness::{dynamic_penalty, Evaluation, FitnessEvaluator, INCLUSION_THRESHOLD};
pub use warm_start::{RankedVariable, WarmStartInitializer};
