//! featswarm - Particle swarm feature selection
//!
//! Searches the subsets of a dataset's candidate predictors for the one
//! with the lowest cross-validated prediction error plus a per-variable
//! complexity penalty.
//!
//! # Modules
//!
//! - [`dataset`] - Column-wise in-memory data, built from polars DataFrames
//! - [`training`] - Model backends (linear, mixed-effects, random forest)
//!   and stratified k-fold cross-validation
//! - [`optimizer`] - Particle swarm optimization over [0, 1]^d
//! - [`selection`] - Fitness evaluation, warm start and the run driver
//! - [`cli`] - Command-line interface
//! - [`utils`] - Data loading and descriptive statistics
//!
//! # Example
//!
//! ```no_run
//! use featswarm::prelude::*;
//! use std::path::Path;
//!
//! let df = DataLoader::new().load_auto(Path::new("plots.csv"))?;
//! let data = Dataset::from_dataframe(&df)?;
//!
//! let config = SelectionConfig::new("yield")
//!     .with_exclude(vec!["year".to_string()])
//!     .with_model_kind(ModelKind::RandomForest);
//! let report = SelectionEngine::new(config)?.run(&data)?;
//! println!("{}", report);
//! # Ok::<(), featswarm::error::FeatswarmError>(())
//! ```

pub mod error;

pub mod dataset;
pub mod optimizer;
pub mod selection;
pub mod training;
pub mod utils;

pub mod cli;

pub use error::{FeatswarmError, Result};

/// Common imports
pub mod prelude {
    pub use crate::dataset::{CandidateVariableSet, Column, ColumnData, Dataset};
    pub use crate::error::{FeatswarmError, Result};
    pub use crate::optimizer::{BoundaryPolicy, EngineState, PsoConfig, PsoEngine, PsoResult};
    pub use crate::selection::{
        FitnessEvaluator, SelectionConfig, SelectionEngine, SelectionReport, SelectionStatus,
        WarmStartInitializer,
    };
    pub use crate::training::{
        create_backend, CrossValidator, FitResult, FoldAssignment, ModelBackend, ModelKind,
        ModelSpec, SENTINEL_FAILURE,
    };
    pub use crate::utils::DataLoader;
}
