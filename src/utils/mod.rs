//! Shared utilities: logging setup and run reporting.

pub mod logging;
pub mod report;

pub use logging::{init_logging, LogConfig};
pub use report::{
    append_summary, BestSnapshot, BestTracker, EpochReport, MetricsWriter, PartitionMetrics,
};
