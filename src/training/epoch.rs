//! Single-epoch passes.
//!
//! Both runners drain a dataloader and collect, in encounter order, the
//! softmax probability row and target of every sample, plus the loss sum
//! weighted by batch size so ragged final batches do not skew the epoch
//! mean. The train runner additionally splits the backward pass into the
//! trunk and head parameter groups and steps each group's optimizer.

use std::sync::Arc;

use burn::{
    data::dataloader::DataLoader,
    nn::loss::CrossEntropyLoss,
    optim::GradientsParams,
    tensor::{
        activation::softmax,
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use tracing::debug;

use crate::dataset::UltrasoundBatch;
use crate::error::{Result, UsplaneError};
use crate::model::PlaneClassifier;
use crate::training::{HeadOptimizer, TrunkOptimizer};

/// Everything an epoch pass produces, ready for metric computation.
#[derive(Debug, Default)]
pub struct EpochResult {
    /// Softmax probability rows, one per sample, in encounter order.
    pub outputs: Vec<Vec<f32>>,
    /// Targets in the same order.
    pub targets: Vec<i64>,
    /// Sum over batches of `batch_loss * batch_size`.
    pub loss_sum: f64,
}

impl EpochResult {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Sample-weighted mean loss over the epoch.
    pub fn mean_loss(&self) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        self.loss_sum / self.targets.len() as f64
    }
}

/// One optimization pass over the training partition. Returns the stepped
/// model together with the collected outputs.
#[allow(clippy::too_many_arguments)]
pub fn run_train_epoch<B: AutodiffBackend>(
    epoch: usize,
    loader: &Arc<dyn DataLoader<B, UltrasoundBatch<B>>>,
    mut model: PlaneClassifier<B>,
    loss_fn: &CrossEntropyLoss<B>,
    trunk_optimizer: &mut TrunkOptimizer<B>,
    head_optimizer: &mut HeadOptimizer<B>,
    trunk_lr: f64,
    head_lr: f64,
) -> Result<(PlaneClassifier<B>, EpochResult)> {
    let mut result = EpochResult::default();

    for (batch_index, batch) in loader.iter().enumerate() {
        let batch_size = batch.targets.dims()[0];
        let logits = model.forward(batch.images);
        let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

        let loss_value: f64 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(UsplaneError::NonFiniteLoss {
                epoch,
                batch: batch_index,
            });
        }
        result.loss_sum += loss_value * batch_size as f64;

        // One backward pass, split into the two parameter groups.
        let mut grads = loss.backward();
        let trunk_grads = GradientsParams::from_module(&mut grads, &model.trunk);
        let head_grads = GradientsParams::from_module(&mut grads, &model.head);

        let PlaneClassifier {
            trunk,
            pool,
            dropout,
            head,
        } = model;
        let trunk = trunk_optimizer.step(trunk_lr, trunk, trunk_grads);
        let head = head_optimizer.step(head_lr, head, head_grads);
        model = PlaneClassifier {
            trunk,
            pool,
            dropout,
            head,
        };

        collect(&mut result, logits.detach(), batch.targets)?;

        if (batch_index + 1) % 20 == 0 {
            debug!(
                epoch,
                batch = batch_index + 1,
                loss = loss_value,
                "train batch"
            );
        }
    }

    Ok((model, result))
}

/// One forward-only pass over a validation or test partition.
pub fn run_eval_epoch<B: Backend>(
    loader: &Arc<dyn DataLoader<B, UltrasoundBatch<B>>>,
    model: &PlaneClassifier<B>,
    loss_fn: &CrossEntropyLoss<B>,
) -> Result<EpochResult> {
    let mut result = EpochResult::default();

    for batch in loader.iter() {
        let batch_size = batch.targets.dims()[0];
        let logits = model.forward(batch.images);
        let loss = loss_fn.forward(logits.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        result.loss_sum += loss_value * batch_size as f64;

        collect(&mut result, logits, batch.targets)?;
    }

    Ok(result)
}

fn collect<B: Backend>(
    result: &mut EpochResult,
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Result<()> {
    let [_, num_classes] = logits.dims();
    let probabilities = softmax(logits, 1);

    let rows: Vec<f32> = probabilities
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| UsplaneError::Readback(format!("probabilities: {e:?}")))?;
    result
        .outputs
        .extend(rows.chunks(num_classes).map(|row| row.to_vec()));

    let targets: Vec<i64> = targets
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| UsplaneError::Readback(format!("targets: {e:?}")))?;
    result.targets.extend(targets);
    Ok(())
}
