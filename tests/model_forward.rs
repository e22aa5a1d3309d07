//! Forward-pass shape checks for every backbone family on the CPU backend.

use burn::backend::NdArray;
use burn::tensor::Tensor;

use usplane::model::{BackboneFamily, PlaneClassifier};

type Backend = NdArray<f32>;

fn forward_dims(family: BackboneFamily, height: usize, width: usize) -> [usize; 2] {
    let device = Default::default();
    let model = PlaneClassifier::<Backend>::new(family, 2, 0.3, 0.2, &device);
    let images = Tensor::<Backend, 4>::zeros([3, 3, height, width], &device);
    model.forward(images).dims()
}

#[test]
fn resnet_produces_binary_logits() {
    assert_eq!(forward_dims(BackboneFamily::Resnet, 160, 315), [3, 2]);
}

#[test]
fn efficientnet_produces_binary_logits() {
    assert_eq!(forward_dims(BackboneFamily::Efficientnet, 160, 315), [3, 2]);
}

#[test]
fn convnext_produces_binary_logits() {
    assert_eq!(forward_dims(BackboneFamily::Convnext, 160, 315), [3, 2]);
}

#[test]
fn families_handle_small_inputs() {
    for family in [
        BackboneFamily::Resnet,
        BackboneFamily::Efficientnet,
        BackboneFamily::Convnext,
    ] {
        assert_eq!(forward_dims(family, 32, 32), [3, 2]);
    }
}

#[test]
fn inference_forward_is_deterministic() {
    // Outside autodiff training, dropout layers are inert.
    let device = Default::default();
    let model = PlaneClassifier::<Backend>::new(BackboneFamily::Convnext, 2, 0.5, 0.5, &device);
    let images = Tensor::<Backend, 4>::ones([2, 3, 64, 64], &device);

    let a: Vec<f32> = model
        .forward(images.clone())
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap();
    let b: Vec<f32> = model
        .forward(images)
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap();
    assert_eq!(a, b);
}
