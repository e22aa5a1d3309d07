//! usplane: standard-plane screening for pelvic floor ultrasound.
//!
//! Trains a binary classifier that separates standard from non-standard
//! ultrasound frames for one maneuver mode at a time. The pipeline covers
//! indexing and augmentation, three convolutional backbone families with a
//! two-group learning-rate split, warm-up cosine or step-decay scheduling,
//! AUC-driven best-model selection and exactly-resumable checkpoints.

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod training;
pub mod utils;

pub use config::TrainConfig;
pub use dataset::{Mode, Sample, UltrasoundBatch, UltrasoundBatcher, UltrasoundDataset, UltrasoundItem};
pub use error::{Result, UsplaneError};
pub use metrics::{ConfusionMatrix, Partition};
pub use model::{BackboneFamily, PlaneClassifier};
pub use training::{fit, FitReport, LrSchedule};

/// Crate version, recorded in run logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
