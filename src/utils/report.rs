//! Run reporting.
//!
//! Two CSV surfaces: a per-epoch `history.csv` inside the run directory,
//! and a cross-run summary CSV that receives exactly one row per finished
//! run, holding the metrics of its best epoch.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

/// Accuracy, AUC and mean loss of one partition for one epoch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PartitionMetrics {
    pub accuracy: f64,
    pub auc: f64,
    pub loss: f64,
}

/// All metrics of one epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train: PartitionMetrics,
    pub val: PartitionMetrics,
    pub test: PartitionMetrics,
}

/// The metrics of the best epoch seen so far, frozen when a new best test
/// AUC is recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BestSnapshot {
    pub epoch: usize,
    pub train_acc: f64,
    pub val_acc: f64,
    pub test_acc: f64,
    pub train_auc: f64,
    pub val_auc: f64,
    pub test_auc: f64,
}

impl BestSnapshot {
    pub fn from_report(report: &EpochReport) -> Self {
        Self {
            epoch: report.epoch,
            train_acc: report.train.accuracy,
            val_acc: report.val.accuracy,
            test_acc: report.test.accuracy,
            train_auc: report.train.auc,
            val_auc: report.val.auc,
            test_auc: report.test.auc,
        }
    }
}

/// Tracks the best test AUC across epochs. A new snapshot is frozen only on
/// strict improvement; ties and regressions leave the previous best (and
/// therefore the artifact on disk) untouched.
#[derive(Debug, Clone)]
pub struct BestTracker {
    best_test_auc: f64,
    snapshot: Option<BestSnapshot>,
}

impl BestTracker {
    /// `best_test_auc` is 0 for a fresh run, or the value carried by a
    /// resume checkpoint.
    pub fn new(best_test_auc: f64) -> Self {
        Self {
            best_test_auc,
            snapshot: None,
        }
    }

    pub fn best_test_auc(&self) -> f64 {
        self.best_test_auc
    }

    /// Returns true iff the epoch strictly improves the best test AUC, in
    /// which case its metrics become the new best snapshot.
    pub fn observe(&mut self, report: &EpochReport) -> bool {
        if report.test.auc > self.best_test_auc {
            self.best_test_auc = report.test.auc;
            self.snapshot = Some(BestSnapshot::from_report(report));
            true
        } else {
            false
        }
    }

    /// Best snapshot recorded during this run, if any epoch improved.
    pub fn into_snapshot(self) -> BestSnapshot {
        self.snapshot.unwrap_or_default()
    }
}

/// Appends epoch rows to `history.csv` in the run directory.
pub struct MetricsWriter {
    history_path: PathBuf,
}

impl MetricsWriter {
    const HEADER: &'static str = "epoch,train_loss,train_acc,train_auc,\
                                  val_loss,val_acc,val_auc,\
                                  test_loss,test_acc,test_auc\n";

    pub fn new(run_dir: &Path) -> Result<Self> {
        fs::create_dir_all(run_dir)?;
        let history_path = run_dir.join("history.csv");
        if !history_path.is_file() {
            fs::write(&history_path, Self::HEADER)?;
        }
        Ok(Self { history_path })
    }

    pub fn append_epoch(&self, report: &EpochReport) -> Result<()> {
        let row = format!(
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}\n",
            report.epoch,
            report.train.loss,
            report.train.accuracy,
            report.train.auc,
            report.val.loss,
            report.val.accuracy,
            report.val.auc,
            report.test.loss,
            report.test.accuracy,
            report.test.auc,
        );
        append(&self.history_path, &row)
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

/// Appends the run's best row to the cross-run summary CSV, creating it
/// with a header first if needed.
pub fn append_summary(metrics_csv: &Path, model_name: &str, best: &BestSnapshot) -> Result<()> {
    if let Some(parent) = metrics_csv.parent() {
        fs::create_dir_all(parent)?;
    }
    if !metrics_csv.is_file() {
        fs::write(
            metrics_csv,
            "model,epoch,train_acc,val_acc,test_acc,train_auc,val_auc,test_auc\n",
        )?;
    }
    let row = format!(
        "{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}\n",
        model_name,
        best.epoch,
        best.train_acc,
        best.val_acc,
        best.test_acc,
        best.train_auc,
        best.val_auc,
        best.test_auc,
    );
    append(metrics_csv, &row)
}

fn append(path: &Path, row: &str) -> Result<()> {
    use std::io::Write;
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(row.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(epoch: usize) -> EpochReport {
        EpochReport {
            epoch,
            train: PartitionMetrics {
                accuracy: 0.9,
                auc: 0.95,
                loss: 0.3,
            },
            val: PartitionMetrics {
                accuracy: 0.85,
                auc: 0.9,
                loss: 0.4,
            },
            test: PartitionMetrics {
                accuracy: 0.8,
                auc: 0.88,
                loss: 0.5,
            },
        }
    }

    #[test]
    fn history_accumulates_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MetricsWriter::new(dir.path()).unwrap();
        writer.append_epoch(&report(1)).unwrap();
        writer.append_epoch(&report(2)).unwrap();

        let contents = fs::read_to_string(writer.history_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch,train_loss"));
        assert!(lines[1].starts_with("1,"));
        assert!(lines[2].starts_with("2,"));
    }

    #[test]
    fn summary_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("metrics.csv");
        let best = BestSnapshot::from_report(&report(7));

        append_summary(&csv, "convnext-j-v1", &best).unwrap();
        append_summary(&csv, "resnet-j-v1", &best).unwrap();

        let contents = fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("convnext-j-v1,7,0.9000"));
        assert!(lines[2].starts_with("resnet-j-v1,7,"));
    }

    fn report_with_test_auc(epoch: usize, test_auc: f64) -> EpochReport {
        let mut r = report(epoch);
        r.test.auc = test_auc;
        r
    }

    #[test]
    fn best_updates_only_on_strict_improvement() {
        let mut tracker = BestTracker::new(0.0);

        assert!(tracker.observe(&report_with_test_auc(1, 0.80)));
        assert!((tracker.best_test_auc() - 0.80).abs() < 1e-12);

        // A tie is not an improvement; the epoch-1 snapshot stays.
        assert!(!tracker.observe(&report_with_test_auc(2, 0.80)));
        // Neither is a regression.
        assert!(!tracker.observe(&report_with_test_auc(3, 0.75)));
        assert!((tracker.best_test_auc() - 0.80).abs() < 1e-12);

        assert!(tracker.observe(&report_with_test_auc(4, 0.81)));
        let best = tracker.into_snapshot();
        assert_eq!(best.epoch, 4);
        assert!((best.test_auc - 0.81).abs() < 1e-12);
    }

    #[test]
    fn best_respects_resumed_baseline() {
        // A resumed run must beat the checkpointed best, not zero.
        let mut tracker = BestTracker::new(0.90);
        assert!(!tracker.observe(&report_with_test_auc(11, 0.90)));
        assert!(!tracker.observe(&report_with_test_auc(12, 0.89)));
        assert_eq!(tracker.clone().into_snapshot().epoch, 0);

        assert!(tracker.observe(&report_with_test_auc(13, 0.901)));
        assert_eq!(tracker.into_snapshot().epoch, 13);
    }

    #[test]
    fn best_snapshot_copies_all_fields() {
        let best = BestSnapshot::from_report(&report(12));
        assert_eq!(best.epoch, 12);
        assert!((best.test_auc - 0.88).abs() < 1e-12);
        assert!((best.val_acc - 0.85).abs() < 1e-12);
    }
}
