//! Evaluation metrics computed on the host from collected epoch outputs.

pub mod charts;

use std::fmt;

use crate::error::{Result, UsplaneError};

/// Which split a metric was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Val,
    Test,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Val => "val",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argmax class index per probability row.
pub fn predictions(outputs: &[Vec<f32>]) -> Vec<i64> {
    outputs
        .iter()
        .map(|row| {
            let mut best = 0usize;
            for (class, value) in row.iter().enumerate() {
                if *value > row[best] {
                    best = class;
                }
            }
            best as i64
        })
        .collect()
}

/// Probability assigned to the positive (non-standard) class, per row.
pub fn positive_scores(outputs: &[Vec<f32>]) -> Vec<f32> {
    outputs.iter().map(|row| row[1]).collect()
}

/// Fraction of rows whose argmax matches the target.
pub fn accuracy(outputs: &[Vec<f32>], targets: &[i64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let correct = predictions(outputs)
        .iter()
        .zip(targets)
        .filter(|(pred, target)| pred == target)
        .count();
    correct as f64 / targets.len() as f64
}

/// Area under the ROC curve via the rank-statistic form, with midranks for
/// tied scores. Errors when the partition holds a single class.
pub fn roc_auc(scores: &[f32], targets: &[i64], partition: Partition) -> Result<f64> {
    let positives = targets.iter().filter(|t| **t == 1).count();
    let negatives = targets.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(UsplaneError::DegenerateLabels {
            partition: partition.as_str(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    // Average rank within each tie group, ranks 1-based.
    let mut ranks = vec![0.0f64; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &index in &order[i..=j] {
            ranks[index] = midrank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = targets
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t == 1)
        .map(|(_, r)| *r)
        .sum();

    let n_pos = positives as f64;
    let n_neg = negatives as f64;
    Ok((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Square confusion matrix, rows are actual classes, columns predicted.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    num_classes: usize,
    matrix: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    pub fn from_predictions(predictions: &[i64], targets: &[i64], num_classes: usize) -> Self {
        let mut cm = Self::new(num_classes);
        for (pred, target) in predictions.iter().zip(targets) {
            cm.add(*target as usize, *pred as usize);
        }
        cm
    }

    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.matrix[actual * self.num_classes + predicted]
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|c| self.get(c, c)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(labels: &[i64]) -> Vec<Vec<f32>> {
        labels
            .iter()
            .map(|l| if *l == 0 { vec![0.9, 0.1] } else { vec![0.2, 0.8] })
            .collect()
    }

    #[test]
    fn accuracy_counts_matches() {
        // Predictions [0, 0, 1, 0] against targets [0, 0, 1, 1].
        let outputs = one_hot(&[0, 0, 1, 0]);
        let targets = vec![0, 0, 1, 1];
        assert!((accuracy(&outputs, &targets) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn accuracy_empty_is_zero() {
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn auc_perfect_separation() {
        let scores = vec![0.1, 0.2, 0.8, 0.9];
        let targets = vec![0, 0, 1, 1];
        let auc = roc_auc(&scores, &targets, Partition::Test).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn auc_inverted_separation() {
        let scores = vec![0.9, 0.8, 0.2, 0.1];
        let targets = vec![0, 0, 1, 1];
        let auc = roc_auc(&scores, &targets, Partition::Test).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn auc_ties_use_midranks() {
        // All scores equal: chance-level AUC regardless of labels.
        let scores = vec![0.5, 0.5, 0.5, 0.5];
        let targets = vec![0, 1, 0, 1];
        let auc = roc_auc(&scores, &targets, Partition::Val).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn auc_single_class_is_degenerate() {
        let err = roc_auc(&[0.1, 0.9], &[1, 1], Partition::Test).unwrap_err();
        assert!(matches!(
            err,
            UsplaneError::DegenerateLabels { partition: "test" }
        ));
    }

    #[test]
    fn auc_matches_hand_computed_mixed_case() {
        // Ranks: 0.3 -> 1, 0.4 -> 2, 0.6 -> 3, 0.7 -> 4.
        // Positive ranks sum = 2 + 4 = 6, n_pos = n_neg = 2.
        // AUC = (6 - 3) / 4 = 0.75.
        let scores = vec![0.3, 0.4, 0.7, 0.6];
        let targets = vec![0, 1, 1, 0];
        let auc = roc_auc(&scores, &targets, Partition::Train).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn confusion_matrix_counts() {
        let predictions = vec![0, 0, 1, 0];
        let targets = vec![0, 0, 1, 1];
        let cm = ConfusionMatrix::from_predictions(&predictions, &targets, 2);
        assert_eq!(cm.get(0, 0), 2);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(0, 1), 0);
        assert_eq!(cm.total(), 4);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn predictions_take_argmax() {
        let outputs = vec![vec![0.6, 0.4], vec![0.3, 0.7]];
        assert_eq!(predictions(&outputs), vec![0, 1]);
    }
}
