//! Run configuration.
//!
//! One typed struct covers the whole CLI surface; it is validated up front
//! and serialized verbatim to `parameters.json` in the run directory so
//! every run records the configuration that produced it.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::dataset::{Mode, TransformConfig};
use crate::error::{Result, UsplaneError};
use crate::model::BackboneFamily;
use crate::training::{LossKind, LrSchedule, OptimizerKind, SchedulerKind};

/// Train a binary standard-plane classifier on pelvic floor ultrasound.
#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "usplane", version, about)]
pub struct TrainConfig {
    /// Number of output classes.
    #[arg(long, default_value_t = 2)]
    pub num_classes: usize,

    /// Input height after resize.
    #[arg(long, default_value_t = 160)]
    pub resize_h: u32,

    /// Input width after resize.
    #[arg(long, default_value_t = 315)]
    pub resize_w: u32,

    /// Enable random blur during training.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub blur: bool,

    /// Enable random histogram equalization during training.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub equalization: bool,

    /// Enable random percentile contrast stretching during training.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub contrast_enhancement: bool,

    /// Enable random cutout during training.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub cutout: bool,

    /// Maneuver mode: J (resting) or V (Valsalva).
    #[arg(long, value_enum, default_value = "j")]
    pub mode: Mode,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Dataloader worker threads per partition.
    #[arg(long, default_value_t = 8)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value = "adam-w")]
    pub optimizer: OptimizerKind,

    #[arg(long, value_enum, default_value = "cross-entropy")]
    pub loss: LossKind,

    #[arg(long, value_enum, default_value = "warmup-cosine")]
    pub scheduler: SchedulerKind,

    /// Base learning rate for the trunk parameter group.
    #[arg(long, default_value_t = 1e-5)]
    pub lr_base: f64,

    /// Base learning rate for the head parameter group.
    #[arg(long, default_value_t = 5e-5)]
    pub lr_head: f64,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f32,

    /// Warm-up start, as a fraction of the base rate.
    #[arg(long, default_value_t = 0.1)]
    pub init_ratio: f64,

    /// Cosine floor, as a fraction of the base rate.
    #[arg(long, default_value_t = 0.001)]
    pub min_lr_ratio: f64,

    /// Epochs per decay step (step-decay schedule).
    #[arg(long, default_value_t = 30)]
    pub step_size: usize,

    /// Decay factor (step-decay schedule).
    #[arg(long, default_value_t = 0.1)]
    pub gamma: f64,

    /// Dropout before the classification head.
    #[arg(long, default_value_t = 0.3)]
    pub drop_rate: f64,

    /// Stochastic-depth rate inside the trunk.
    #[arg(long, default_value_t = 0.2)]
    pub drop_path_rate: f64,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Request data-parallel replication across the listed devices.
    #[arg(long, default_value_t = false)]
    pub parallel: bool,

    /// Accelerator indices; the first one drives compute.
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub device_ids: Vec<usize>,

    /// Checkpoint directory to resume from.
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Trunk weights recorded by a previous run.
    #[arg(long)]
    pub pretrained_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "convnext")]
    pub backbone: BackboneFamily,

    /// Name used for the best artifact, the run directory and the summary
    /// row.
    #[arg(long, default_value = "convnext-j-v1")]
    pub model_name: String,

    /// CSV index of the training partition.
    #[arg(long, default_value = "data/train.csv")]
    pub train_csv: PathBuf,

    /// CSV index of the validation partition.
    #[arg(long, default_value = "data/val.csv")]
    pub val_csv: PathBuf,

    /// Root of the grouped test-partition directory tree.
    #[arg(long, default_value = "data/TestSet")]
    pub test_root: PathBuf,

    /// Directory for the best-model artifact.
    #[arg(long, default_value = "output/models")]
    pub saved_path: PathBuf,

    /// Directory for resumable checkpoints.
    #[arg(long, default_value = "output/checkpoints")]
    pub ckpt_path: PathBuf,

    /// Directory for per-run logs and reports.
    #[arg(long, default_value = "output/logs")]
    pub log_dir: PathBuf,

    /// Append-only summary CSV, one row per finished run.
    #[arg(long, default_value = "output/metrics.csv")]
    pub metrics_csv: PathBuf,

    /// Write a checkpoint every this many epochs.
    #[arg(long, default_value_t = 10)]
    pub checkpoint_interval: usize,

    #[arg(long, default_value_t = 2023)]
    pub seed: u64,

    /// Debug-level logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl TrainConfig {
    /// Fails fast on invalid values or missing inputs, naming the offender.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(UsplaneError::Config(message));

        if self.num_classes != 2 {
            return fail(format!(
                "num_classes must be 2 for binary AUC tracking, got {}",
                self.num_classes
            ));
        }
        if self.epochs == 0 {
            return fail("epochs must be at least 1".into());
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".into());
        }
        if self.resize_h == 0 || self.resize_w == 0 {
            return fail("resize dimensions must be positive".into());
        }
        if self.lr_base <= 0.0 || self.lr_head <= 0.0 {
            return fail("learning rates must be positive".into());
        }
        if !(0.0..1.0).contains(&self.drop_rate) || !(0.0..1.0).contains(&self.drop_path_rate) {
            return fail("dropout rates must lie in [0, 1)".into());
        }
        if !(0.0..=1.0).contains(&self.init_ratio) || !(0.0..=1.0).contains(&self.min_lr_ratio) {
            return fail("schedule ratios must lie in [0, 1]".into());
        }
        if self.step_size == 0 {
            return fail("step_size must be at least 1".into());
        }
        if self.checkpoint_interval == 0 {
            return fail("checkpoint_interval must be at least 1".into());
        }
        if self.device_ids.is_empty() {
            return fail("device_ids must name at least one device".into());
        }

        if !self.train_csv.is_file() {
            return fail(format!("train index not found: {}", self.train_csv.display()));
        }
        if !self.val_csv.is_file() {
            return fail(format!("val index not found: {}", self.val_csv.display()));
        }
        if !self.test_root.is_dir() {
            return fail(format!("test root not found: {}", self.test_root.display()));
        }
        if let Some(resume) = &self.resume {
            if !resume.is_dir() {
                return fail(format!("resume checkpoint not found: {}", resume.display()));
            }
        }
        if let Some(pretrained) = &self.pretrained_path {
            if !pretrained.is_file() {
                return fail(format!(
                    "pretrained weights not found: {}",
                    pretrained.display()
                ));
            }
        }
        Ok(())
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            height: self.resize_h,
            width: self.resize_w,
            blur: self.blur,
            equalization: self.equalization,
            contrast_enhancement: self.contrast_enhancement,
            cutout: self.cutout,
        }
    }

    /// Builds the configured schedule at step zero.
    pub fn schedule(&self) -> LrSchedule {
        match self.scheduler {
            SchedulerKind::WarmupCosine => {
                LrSchedule::warmup_cosine(self.epochs, self.init_ratio, self.min_lr_ratio)
            }
            SchedulerKind::StepDecay => LrSchedule::step_decay(self.step_size, self.gamma),
        }
    }
}
