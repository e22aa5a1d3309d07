//! Resumable checkpoints.
//!
//! A checkpoint is a directory `ckpt-epoch-{N}/` holding the model record,
//! one optimizer record per parameter group (full precision, so resumed
//! state is exact) and a `state.json` with the epoch number, the best test
//! AUC so far and the serialized schedule. The best-model artifact is
//! separate and written by the orchestrator.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UsplaneError};
use crate::model::PlaneClassifier;
use crate::training::{HeadOptimizer, LrSchedule, TrunkOptimizer};

const MODEL_FILE: &str = "model";
const TRUNK_OPTIM_FILE: &str = "optim-trunk";
const HEAD_OPTIM_FILE: &str = "optim-head";
const STATE_FILE: &str = "state.json";

/// The non-tensor part of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Epoch the checkpoint was written after. Resume starts at `epoch + 1`.
    pub epoch: usize,
    pub best_test_auc: f64,
    pub schedule: LrSchedule,
}

/// Writes and restores checkpoint directories under a root.
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn checkpoint_dir(&self, epoch: usize) -> PathBuf {
        self.root.join(format!("ckpt-epoch-{epoch}"))
    }

    /// Writes one complete checkpoint and returns its directory.
    pub fn save<B: AutodiffBackend>(
        &self,
        epoch: usize,
        model: &PlaneClassifier<B>,
        trunk_optimizer: &TrunkOptimizer<B>,
        head_optimizer: &HeadOptimizer<B>,
        schedule: &LrSchedule,
        best_test_auc: f64,
    ) -> Result<PathBuf> {
        let dir = self.checkpoint_dir(epoch);
        fs::create_dir_all(&dir)?;

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(dir.join(MODEL_FILE), &recorder)
            .map_err(|e| {
                UsplaneError::Checkpoint(format!(
                    "failed to write model record to {}: {e}",
                    dir.display()
                ))
            })?;
        trunk_optimizer.save(&dir.join(TRUNK_OPTIM_FILE))?;
        head_optimizer.save(&dir.join(HEAD_OPTIM_FILE))?;

        let state = CheckpointState {
            epoch,
            best_test_auc,
            schedule: schedule.clone(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| UsplaneError::Checkpoint(format!("failed to encode state: {e}")))?;
        fs::write(dir.join(STATE_FILE), json)?;

        Ok(dir)
    }

    /// Restores a checkpoint directory into freshly-constructed model and
    /// optimizer values. Fails naming the missing component if the
    /// directory is incomplete, or if the model record does not match the
    /// configured architecture.
    pub fn load<B: AutodiffBackend>(
        dir: &Path,
        model: PlaneClassifier<B>,
        trunk_optimizer: TrunkOptimizer<B>,
        head_optimizer: HeadOptimizer<B>,
        device: &B::Device,
    ) -> Result<(
        PlaneClassifier<B>,
        TrunkOptimizer<B>,
        HeadOptimizer<B>,
        CheckpointState,
    )> {
        for file in [
            format!("{MODEL_FILE}.bin"),
            format!("{TRUNK_OPTIM_FILE}.bin"),
            format!("{HEAD_OPTIM_FILE}.bin"),
            STATE_FILE.to_string(),
        ] {
            if !dir.join(&file).is_file() {
                return Err(UsplaneError::Checkpoint(format!(
                    "checkpoint {} is missing {file}",
                    dir.display()
                )));
            }
        }

        let raw = fs::read_to_string(dir.join(STATE_FILE))?;
        let state: CheckpointState = serde_json::from_str(&raw).map_err(|e| {
            UsplaneError::Checkpoint(format!("invalid state.json in {}: {e}", dir.display()))
        })?;

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model = model
            .load_file(dir.join(MODEL_FILE), &recorder, device)
            .map_err(|e| {
                UsplaneError::Checkpoint(format!(
                    "model record in {} does not match the configured model: {e}",
                    dir.display()
                ))
            })?;
        let trunk_optimizer = trunk_optimizer.load(&dir.join(TRUNK_OPTIM_FILE), device)?;
        let head_optimizer = head_optimizer.load(&dir.join(HEAD_OPTIM_FILE), device)?;

        Ok((model, trunk_optimizer, head_optimizer, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_json() {
        let state = CheckpointState {
            epoch: 40,
            best_test_auc: 0.912,
            schedule: LrSchedule::warmup_cosine(100, 0.1, 0.001),
        };
        let json = serde_json::to_string_pretty(&state).unwrap();
        let restored: CheckpointState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn missing_component_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("ckpt-epoch-10");
        fs::create_dir_all(&ckpt).unwrap();
        fs::write(ckpt.join("state.json"), "{}").unwrap();

        use burn::backend::{Autodiff, NdArray};
        type B = Autodiff<NdArray<f32>>;
        use crate::model::BackboneFamily;
        use crate::training::{GroupOptimizer, OptimizerKind};

        let device = Default::default();
        let model = PlaneClassifier::<B>::new(BackboneFamily::Resnet, 2, 0.0, 0.0, &device);
        let trunk_optimizer = GroupOptimizer::new(OptimizerKind::AdamW, 0.01);
        let head_optimizer = GroupOptimizer::new(OptimizerKind::AdamW, 0.01);

        let err = CheckpointStore::load(&ckpt, model, trunk_optimizer, head_optimizer, &device)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing"));
        assert!(message.contains("model.bin"));
    }
}
