//! Standard-plane classifier.
//!
//! The trunk and the linear head are separate modules on purpose: they form
//! the two parameter groups the optimizer steps with different learning
//! rates (a pretrained-style low rate for the trunk, a higher one for the
//! fresh head).

use std::path::Path;

use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};

use crate::error::{Result, UsplaneError};
use crate::model::trunk::{Trunk, FEATURE_CHANNELS};
use crate::model::BackboneFamily;

#[derive(Module, Debug)]
pub struct PlaneClassifier<B: Backend> {
    pub trunk: Trunk<B>,
    pub pool: AdaptiveAvgPool2d,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

impl<B: Backend> PlaneClassifier<B> {
    pub fn new(
        family: BackboneFamily,
        num_classes: usize,
        drop_rate: f64,
        drop_path_rate: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            trunk: Trunk::new(family, drop_path_rate, device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(drop_rate).init(),
            head: LinearConfig::new(FEATURE_CHANNELS, num_classes).init(device),
        }
    }

    /// `[batch, 3, H, W]` -> `[batch, num_classes]` logits.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.trunk.forward(images);
        let pooled = self.pool.forward(features);
        let [batch, channels, _, _] = pooled.dims();
        let flat = pooled.reshape([batch, channels]);
        self.head.forward(self.dropout.forward(flat))
    }

    /// Replaces the trunk with weights recorded by a previous run. The head
    /// stays freshly initialized.
    pub fn load_trunk_weights(self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = CompactRecorder::new();
        let Self {
            trunk,
            pool,
            dropout,
            head,
        } = self;
        let trunk = trunk
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| {
                UsplaneError::Checkpoint(format!(
                    "pretrained trunk weights at {} do not match the configured backbone: {e}",
                    path.display()
                ))
            })?;
        Ok(Self {
            trunk,
            pool,
            dropout,
            head,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn logits_are_binary_for_every_family() {
        let device = Default::default();
        for family in [
            BackboneFamily::Resnet,
            BackboneFamily::Efficientnet,
            BackboneFamily::Convnext,
        ] {
            let model = PlaneClassifier::<B>::new(family, 2, 0.3, 0.2, &device);
            let images = Tensor::<B, 4>::zeros([2, 3, 160, 315], &device);
            let logits = model.forward(images);
            assert_eq!(logits.dims(), [2, 2]);
        }
    }
}
