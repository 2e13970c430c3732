// src/error.rs

//! Error taxonomy for the PCA pipeline.
//!
//! Every failure is terminal for the run that produced it. Variants carry enough
//! context (column name, matrix shape) to diagnose the input without re-running.

use thiserror::Error;

/// Errors produced by loading, standardizing, decomposing and interpreting a dataset.
#[derive(Error, Debug)]
pub enum PcaError {
    /// A column has (numerically) zero variance and cannot be scaled to unit variance.
    #[error("column '{column}' (index {index}) has zero variance")]
    DegenerateColumn { column: String, index: usize },

    /// Too few samples for a full-rank covariance matrix (requires n > p).
    #[error("insufficient samples: {n_samples} samples for {n_features} features (need more samples than features)")]
    InsufficientSamples { n_samples: usize, n_features: usize },

    /// The eigen-solver (or SVD) failed to converge.
    #[error("decomposition of a {}x{} matrix did not converge: {message}", shape.0, shape.1)]
    NonConvergence { shape: (usize, usize), message: String },

    /// The input tables do not have the expected structure (missing join key, duplicate key,
    /// non-numeric element cell, no usable columns).
    #[error("schema mismatch in {context}: {message}")]
    SchemaMismatch { context: String, message: String },

    /// An element cell was empty.
    #[error("missing value in column '{column}' for sample '{sample}'")]
    MissingValue { column: String, sample: String },

    /// A display or table selection referred to something that does not exist.
    #[error("unknown selection: {0}")]
    UnknownSelection(String),

    /// A persisted or hand-built model is internally inconsistent.
    #[error("invalid PCA model: {0}")]
    InvalidModel(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize PCA model: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to deserialize PCA model: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PcaError>;
