//! Data loading utilities

use crate::error::{FeatswarmError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Data loader for CSV, JSON and Parquet files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for CSV schema inference
    infer_schema_length: usize,
    /// CSV field separator
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            separator: b',',
        }
    }

    /// Set the number of rows used to infer a CSV schema
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Set the CSV separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        self.load_csv_with_separator(path, self.separator)
    }

    fn load_csv_with_separator(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = File::open(path)?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| FeatswarmError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| FeatswarmError::DataError(e.to_string()))
    }

    /// Load a JSON file
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;

        JsonReader::new(file)
            .finish()
            .map_err(|e| FeatswarmError::DataError(e.to_string()))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => self.load_csv(path),
            "tsv" => self.load_csv_with_separator(path, b'\t'),
            "parquet" | "pq" => self.load_parquet(path),
            "json" | "jsonl" => self.load_json(path),
            other => Err(FeatswarmError::DataError(format!(
                "Unsupported file format: '{}'",
                other
            ))),
        }
    }
}
