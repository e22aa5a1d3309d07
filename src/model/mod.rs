//! Classifier model: convolutional trunks behind a closed family registry,
//! topped by a pooled dropout + linear head.

pub mod classifier;
pub mod trunk;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use classifier::PlaneClassifier;
pub use trunk::{Trunk, FEATURE_CHANNELS};

/// Supported backbone families. A closed registry: adding a family means
/// adding a variant, there is no name matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum BackboneFamily {
    Resnet,
    Efficientnet,
    Convnext,
}
