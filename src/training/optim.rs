//! Loss and optimizer construction.
//!
//! Both are selected through closed enums. `GroupOptimizer` wraps one
//! optimizer instance per parameter group; the trainer holds one for the
//! trunk and one for the head so the two groups step with different
//! learning rates while sharing a single backward pass.

use std::path::Path;

use burn::{
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{
        adaptor::OptimizerAdaptor, momentum::MomentumConfig, AdamW, AdamWConfig,
        GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    record::{BinFileRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UsplaneError};

/// Optimizer selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OptimizerKind {
    AdamW,
    Sgd,
}

/// Loss selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum LossKind {
    /// Plain cross entropy.
    CrossEntropy,
    /// Cross entropy with label smoothing at 0.1.
    LabelSmooth,
}

impl LossKind {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossEntropyLoss<B> {
        let config = match self {
            LossKind::CrossEntropy => CrossEntropyLossConfig::new(),
            LossKind::LabelSmooth => CrossEntropyLossConfig::new().with_smoothing(Some(0.1)),
        };
        config.init(device)
    }
}

/// One optimizer for one parameter group.
pub enum GroupOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    AdamW(OptimizerAdaptor<AdamW, M, B>),
    Sgd(OptimizerAdaptor<Sgd<B::InnerBackend>, M, B>),
}

impl<M, B> core::fmt::Debug for GroupOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdamW(_) => f.write_str("GroupOptimizer::AdamW"),
            Self::Sgd(_) => f.write_str("GroupOptimizer::Sgd"),
        }
    }
}

impl<M, B> GroupOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    pub fn new(kind: OptimizerKind, weight_decay: f32) -> Self {
        match kind {
            OptimizerKind::AdamW => Self::AdamW(
                AdamWConfig::new().with_weight_decay(weight_decay).init(),
            ),
            OptimizerKind::Sgd => Self::Sgd(
                SgdConfig::new()
                    .with_momentum(Some(MomentumConfig::new().with_momentum(0.9)))
                    .with_weight_decay(Some(burn::optim::decay::WeightDecayConfig::new(
                        weight_decay,
                    )))
                    .init(),
            ),
        }
    }

    /// Applies the group's gradients at the given effective learning rate.
    pub fn step(&mut self, lr: f64, module: M, grads: GradientsParams) -> M {
        match self {
            Self::AdamW(optimizer) => optimizer.step(lr, module, grads),
            Self::Sgd(optimizer) => optimizer.step(lr, module, grads),
        }
    }

    /// Records the optimizer state (moments, iteration counters) to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let result = match self {
            Self::AdamW(optimizer) => recorder.record(optimizer.to_record(), path.to_path_buf()),
            Self::Sgd(optimizer) => recorder.record(optimizer.to_record(), path.to_path_buf()),
        };
        result.map_err(|e| {
            UsplaneError::Checkpoint(format!(
                "failed to write optimizer state to {}: {e}",
                path.display()
            ))
        })
    }

    /// Restores the optimizer state recorded by [`save`](Self::save).
    pub fn load(self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let load_err = |e| {
            UsplaneError::Checkpoint(format!(
                "failed to read optimizer state from {}: {e}",
                path.display()
            ))
        };
        match self {
            Self::AdamW(optimizer) => {
                let record = recorder
                    .load(path.to_path_buf(), device)
                    .map_err(load_err)?;
                Ok(Self::AdamW(optimizer.load_record(record)))
            }
            Self::Sgd(optimizer) => {
                let record = recorder
                    .load(path.to_path_buf(), device)
                    .map_err(load_err)?;
                Ok(Self::Sgd(optimizer.load_record(record)))
            }
        }
    }
}
