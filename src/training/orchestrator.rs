//! Run orchestration.
//!
//! Owns the full lifecycle: index the three partitions, build loaders and
//! the model, optionally restore a checkpoint, then loop epochs. Each epoch
//! runs train, validation and test passes, logs and records metrics, then
//! advances the schedule; a strictly better test AUC freezes a best
//! snapshot and overwrites the best artifact, and every Nth epoch writes a
//! resumable checkpoint.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
};
use tracing::{debug, info, warn};

use crate::config::TrainConfig;
use crate::dataset::{
    csv_index, directory_index, Transform, UltrasoundBatch, UltrasoundBatcher, UltrasoundDataset,
};
use crate::error::{Result, UsplaneError};
use crate::metrics::{self, charts, ConfusionMatrix, Partition};
use crate::model::PlaneClassifier;
use crate::training::{
    run_eval_epoch, run_train_epoch, CheckpointStore, EpochResult, GroupOptimizer, HeadOptimizer,
    TrunkOptimizer,
};
use crate::utils::report::{
    append_summary, BestSnapshot, BestTracker, EpochReport, MetricsWriter, PartitionMetrics,
};

/// What a finished run reports back to the caller.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub best: BestSnapshot,
    pub epochs_run: usize,
}

/// Trains a classifier end to end according to `config`.
pub fn fit<B: AutodiffBackend>(config: &TrainConfig, device: B::Device) -> Result<FitReport> {
    config.validate()?;

    let train_samples = csv_index(&config.train_csv, config.mode)?;
    let val_samples = csv_index(&config.val_csv, config.mode)?;
    let test_samples = directory_index(&config.test_root, config.mode)?;
    info!(
        train = train_samples.len(),
        val = val_samples.len(),
        test = test_samples.len(),
        mode = %config.mode,
        "partitions indexed"
    );

    let transform_config = config.transform_config();
    // Kept as a handle: clones share the epoch counter, so advancing it here
    // re-keys the augmentation streams inside the dataloader workers.
    let train_transform = Transform::train(transform_config.clone(), config.seed);
    let train_dataset = UltrasoundDataset::new(train_samples, train_transform.clone());
    let val_dataset =
        UltrasoundDataset::new(val_samples, Transform::eval(transform_config.clone()));
    let test_dataset = UltrasoundDataset::new(test_samples, Transform::eval(transform_config));

    let batcher = UltrasoundBatcher::new(config.resize_h as usize, config.resize_w as usize);
    let workers = config.num_workers.max(1);

    let train_loader: Arc<dyn DataLoader<B, UltrasoundBatch<B>>> =
        DataLoaderBuilder::new(batcher.clone())
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(workers)
            .set_device(device.clone())
            .build(train_dataset);

    // AutodiffBackend shares its device type with the inner backend, so the
    // configured device drives the eval passes too.
    let inner_device: <B::InnerBackend as Backend>::Device = device.clone();
    let val_loader: Arc<dyn DataLoader<B::InnerBackend, UltrasoundBatch<B::InnerBackend>>> =
        DataLoaderBuilder::new(batcher.clone())
            .batch_size(config.batch_size)
            .num_workers(workers)
            .set_device(inner_device.clone())
            .build(val_dataset);
    let test_loader: Arc<dyn DataLoader<B::InnerBackend, UltrasoundBatch<B::InnerBackend>>> =
        DataLoaderBuilder::new(batcher)
            .batch_size(config.batch_size)
            .num_workers(workers)
            .set_device(inner_device.clone())
            .build(test_dataset);

    if config.parallel {
        // Gradient synchronization across replicas is not wired up; the
        // primary device drives all compute.
        warn!(
            devices = ?config.device_ids,
            "data-parallel replication requested; running on the primary device only"
        );
    }

    let mut model = PlaneClassifier::<B>::new(
        config.backbone,
        config.num_classes,
        config.drop_rate,
        config.drop_path_rate,
        &device,
    );
    if let Some(pretrained) = &config.pretrained_path {
        model = model.load_trunk_weights(pretrained, &device)?;
        info!(path = %pretrained.display(), "pretrained trunk weights loaded");
    }

    let mut trunk_optimizer: TrunkOptimizer<B> =
        GroupOptimizer::new(config.optimizer, config.weight_decay);
    let mut head_optimizer: HeadOptimizer<B> =
        GroupOptimizer::new(config.optimizer, config.weight_decay);
    let mut schedule = config.schedule();
    let mut best = BestTracker::new(0.0);
    let mut first_epoch = 1;

    if let Some(resume) = &config.resume {
        let (restored_model, restored_trunk, restored_head, state) = CheckpointStore::load::<B>(
            resume,
            model,
            trunk_optimizer,
            head_optimizer,
            &device,
        )?;
        model = restored_model;
        trunk_optimizer = restored_trunk;
        head_optimizer = restored_head;
        schedule = state.schedule;
        best = BestTracker::new(state.best_test_auc);
        first_epoch = state.epoch + 1;
        info!(
            checkpoint = %resume.display(),
            epoch = state.epoch,
            best_test_auc = best.best_test_auc(),
            "resumed from checkpoint"
        );
    }

    let store = CheckpointStore::new(&config.ckpt_path);
    let run_dir = config.log_dir.join(&config.model_name);
    let metrics_writer = MetricsWriter::new(&run_dir)?;
    let train_loss = config.loss.init::<B>(&device);
    let eval_loss = config.loss.init::<B::InnerBackend>(&inner_device);

    for epoch in first_epoch..=config.epochs {
        let started = Instant::now();
        let multiplier = schedule.multiplier();
        train_transform.set_epoch(epoch as u64);
        debug!(epoch, multiplier, "epoch start");

        let (stepped_model, train_result) = run_train_epoch(
            epoch,
            &train_loader,
            model,
            &train_loss,
            &mut trunk_optimizer,
            &mut head_optimizer,
            config.lr_base * multiplier,
            config.lr_head * multiplier,
        )?;
        model = stepped_model;

        let eval_model = model.valid();
        let val_result = run_eval_epoch(&val_loader, &eval_model, &eval_loss)?;
        let test_result = run_eval_epoch(&test_loader, &eval_model, &eval_loss)?;

        // The schedule advances once per epoch, after all three passes.
        schedule.step();

        let report = EpochReport {
            epoch,
            train: partition_metrics(&train_result, Partition::Train)?,
            val: partition_metrics(&val_result, Partition::Val)?,
            test: partition_metrics(&test_result, Partition::Test)?,
        };
        info!(
            epoch,
            train_loss = report.train.loss,
            train_acc = report.train.accuracy,
            val_acc = report.val.accuracy,
            val_auc = report.val.auc,
            test_acc = report.test.accuracy,
            test_auc = report.test.auc,
            elapsed_s = started.elapsed().as_secs_f64(),
            "epoch complete"
        );
        metrics_writer.append_epoch(&report)?;

        if best.observe(&report) {
            let predictions = metrics::predictions(&test_result.outputs);
            let cm = ConfusionMatrix::from_predictions(
                &predictions,
                &test_result.targets,
                config.num_classes,
            );
            charts::render_confusion_matrix(
                &cm,
                &config.mode.display_names(),
                &format!("{} test confusion (epoch {epoch})", config.model_name),
                &run_dir.join("confusion_matrix.svg"),
            )?;
            save_best_artifact(config, &model)?;
            info!(epoch, test_auc = best.best_test_auc(), "new best test AUC");
        }

        if epoch % config.checkpoint_interval == 0 {
            let path = store.save(
                epoch,
                &model,
                &trunk_optimizer,
                &head_optimizer,
                &schedule,
                best.best_test_auc(),
            )?;
            info!(path = %path.display(), "checkpoint written");
        }
    }

    let best = best.into_snapshot();
    info!(
        best_epoch = best.epoch,
        best_test_auc = best.test_auc,
        "run finished"
    );
    append_summary(&config.metrics_csv, &config.model_name, &best)?;

    let parameters = serde_json::to_string_pretty(config)
        .map_err(|e| UsplaneError::Config(format!("failed to encode parameters: {e}")))?;
    fs::write(run_dir.join("parameters.json"), parameters)?;

    Ok(FitReport {
        best,
        epochs_run: (config.epochs + 1).saturating_sub(first_epoch),
    })
}

fn partition_metrics(result: &EpochResult, partition: Partition) -> Result<PartitionMetrics> {
    Ok(PartitionMetrics {
        accuracy: metrics::accuracy(&result.outputs, &result.targets),
        auc: metrics::roc_auc(
            &metrics::positive_scores(&result.outputs),
            &result.targets,
            partition,
        )?,
        loss: result.mean_loss(),
    })
}

fn save_best_artifact<B: AutodiffBackend>(
    config: &TrainConfig,
    model: &PlaneClassifier<B>,
) -> Result<()> {
    fs::create_dir_all(&config.saved_path)?;
    let recorder = CompactRecorder::new();
    model
        .clone()
        .save_file(config.saved_path.join(&config.model_name), &recorder)
        .map_err(|e| {
            UsplaneError::Checkpoint(format!(
                "failed to write best artifact to {}: {e}",
                config.saved_path.display()
            ))
        })
}
