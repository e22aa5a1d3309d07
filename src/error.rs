//! Error types for the training pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the usplane training pipeline.
#[derive(Error, Debug)]
pub enum UsplaneError {
    /// Invalid or inconsistent configuration, caught before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A label string in an index that is not part of the active mode's
    /// class dictionary.
    #[error("unknown label '{label}' for mode {mode} in {index}")]
    UnknownLabel {
        label: String,
        mode: String,
        index: PathBuf,
    },

    /// An index file or dataset directory could not be read.
    #[error("failed to read {path}: {message}")]
    DataAccess { path: PathBuf, message: String },

    /// ROC AUC is undefined when a partition contains a single class.
    #[error("AUC is undefined: {partition} partition contains a single class")]
    DegenerateLabels { partition: &'static str },

    /// A checkpoint could not be written, or a resume checkpoint is missing
    /// a component or does not match the configured model.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Tensor data could not be copied back to the host for metric
    /// computation.
    #[error("tensor readback failed: {0}")]
    Readback(String),

    /// Training produced a NaN or infinite batch loss.
    #[error("non-finite loss at epoch {epoch}, batch {batch}; resume from the last checkpoint")]
    NonFiniteLoss { epoch: usize, batch: usize },

    #[error("malformed index: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UsplaneError>;
