//! Utility functions and types

pub mod data_loader;
pub mod stats;

pub use data_loader::DataLoader;
pub use stats::{mean, mean_absolute_error, pearson, sample_std};
