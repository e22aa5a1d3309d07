//! Training: per-epoch passes, optimizer groups, schedules, checkpoints and
//! the run orchestrator.

pub mod checkpoint;
pub mod epoch;
pub mod optim;
pub mod orchestrator;
pub mod scheduler;

use burn::nn::Linear;

use crate::model::Trunk;

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use epoch::{run_eval_epoch, run_train_epoch, EpochResult};
pub use optim::{GroupOptimizer, LossKind, OptimizerKind};
pub use orchestrator::{fit, FitReport};
pub use scheduler::{LrSchedule, SchedulerKind};

/// Optimizer for the trunk parameter group.
pub type TrunkOptimizer<B> = GroupOptimizer<Trunk<B>, B>;

/// Optimizer for the classification-head parameter group.
pub type HeadOptimizer<B> = GroupOptimizer<Linear<B>, B>;
