//! Dataset indexing, decoding and batching.
//!
//! An index maps image paths to binary labels (0 = standard plane,
//! 1 = non-standard). Indexing is eager and cheap; pixel decoding happens
//! lazily inside the dataloader workers.

pub mod burn_dataset;
pub mod index;
pub mod transform;

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use burn_dataset::{UltrasoundBatch, UltrasoundBatcher, UltrasoundDataset, UltrasoundItem};
pub use index::{csv_index, directory_index, TEST_GROUPS};
pub use transform::{Transform, TransformConfig, NORM_MEAN, NORM_STD};

/// One indexed image: where to find it and its binary label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: usize,
}

/// Maneuver mode. Each mode selects a disjoint pair of label classes; frames
/// from the other mode are rejected at index time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Resting frames.
    #[value(alias = "J")]
    J,
    /// Valsalva maneuver frames.
    #[value(alias = "V")]
    V,
}

impl Mode {
    /// Class directory names paired with their labels, in label order.
    pub fn class_dict(&self) -> [(&'static str, usize); 2] {
        match self {
            Mode::J => [("1.静息-标准", 0), ("2.静息-非标准", 1)],
            Mode::V => [("3.Valsalva-标准", 0), ("4.Valsalva-非标准", 1)],
        }
    }

    /// Label for a raw class-name string, if it belongs to this mode.
    pub fn label_of(&self, class_name: &str) -> Option<usize> {
        self.class_dict()
            .iter()
            .find(|(name, _)| *name == class_name)
            .map(|(_, label)| *label)
    }

    /// English display names used in reports, in label order.
    pub fn display_names(&self) -> [&'static str; 2] {
        ["standard", "non-standard"]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::J => write!(f, "J"),
            Mode::V => write!(f, "V"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_dictionaries_are_disjoint() {
        for (name, _) in Mode::J.class_dict() {
            assert_eq!(Mode::V.label_of(name), None);
        }
        for (name, _) in Mode::V.class_dict() {
            assert_eq!(Mode::J.label_of(name), None);
        }
    }

    #[test]
    fn resting_labels() {
        assert_eq!(Mode::J.label_of("1.静息-标准"), Some(0));
        assert_eq!(Mode::J.label_of("2.静息-非标准"), Some(1));
        assert_eq!(Mode::J.label_of("not a class"), None);
    }

    #[test]
    fn valsalva_labels() {
        assert_eq!(Mode::V.label_of("3.Valsalva-标准"), Some(0));
        assert_eq!(Mode::V.label_of("4.Valsalva-非标准"), Some(1));
    }
}
