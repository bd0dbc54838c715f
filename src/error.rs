//! Error types for the onn-preprocess library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid abundance value '{value}' in {file} at row {row}")]
    InvalidAbundance {
        file: String,
        row: usize,
        value: String,
    },

    #[error("Missing column {column} in {file} at row {row}")]
    MissingColumn {
        file: String,
        row: usize,
        column: usize,
    },

    #[error("Hierarchy file not found: {0}")]
    MissingHierarchy(PathBuf),

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Sample {index} ({source_name}) failed: {source}")]
    Sample {
        index: usize,
        source_name: String,
        #[source]
        source: Box<PrepError>,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid fix rule: {0}")]
    Regex(#[from] regex::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("npz write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),

    #[error("npz read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, PrepError>;
