//! Burn dataset and batcher adapters.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;

use crate::dataset::{Sample, Transform};

/// One decoded, transformed sample ready for batching.
#[derive(Debug, Clone)]
pub struct UltrasoundItem {
    /// Normalized CHW pixels.
    pub image: Vec<f32>,
    pub label: usize,
    pub path: String,
}

/// Lazily-decoding dataset over an index of samples.
pub struct UltrasoundDataset {
    samples: Vec<Sample>,
    transform: Transform,
}

impl UltrasoundDataset {
    pub fn new(samples: Vec<Sample>, transform: Transform) -> Self {
        Self { samples, transform }
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<UltrasoundItem> for UltrasoundDataset {
    fn get(&self, index: usize) -> Option<UltrasoundItem> {
        let sample = self.samples.get(index)?;
        // Decode failures cannot travel through the dataloader workers as
        // values; an unreadable image aborts the run, and a restart resumes
        // from the last checkpoint.
        let image = match image::open(&sample.path) {
            Ok(image) => image,
            Err(e) => panic!("failed to decode {}: {e}", sample.path.display()),
        };
        Some(UltrasoundItem {
            image: self.transform.apply(image, index),
            label: sample.label,
            path: sample.path.display().to_string(),
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// One mini-batch of images and integer targets.
#[derive(Debug, Clone)]
pub struct UltrasoundBatch<B: Backend> {
    /// `[batch, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// `[batch]`
    pub targets: Tensor<B, 1, Int>,
}

/// Stacks items into tensors on the loader's device.
#[derive(Debug, Clone)]
pub struct UltrasoundBatcher {
    height: usize,
    width: usize,
}

impl UltrasoundBatcher {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl<B: Backend> Batcher<B, UltrasoundItem, UltrasoundBatch<B>> for UltrasoundBatcher {
    fn batch(&self, items: Vec<UltrasoundItem>, device: &B::Device) -> UltrasoundBatch<B> {
        let targets: Vec<i64> = items.iter().map(|item| item.label as i64).collect();

        let images: Vec<Tensor<B, 4>> = items
            .iter()
            .map(|item| {
                Tensor::<B, 1>::from_floats(item.image.as_slice(), device)
                    .reshape([1, 3, self.height, self.width])
            })
            .collect();

        UltrasoundBatch {
            images: Tensor::cat(images, 0),
            targets: Tensor::from_ints(targets.as_slice(), device),
        }
    }
}
