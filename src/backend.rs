//! Backend selection.
//!
//! Exactly one backend feature must be active. The `ndarray` CPU backend is
//! the default so the test suite and small runs work everywhere; `wgpu` and
//! `cuda` swap in GPU compute without touching the training code.

use burn::backend::Autodiff;

#[cfg(all(feature = "wgpu", feature = "cuda"))]
compile_error!("features `wgpu` and `cuda` are mutually exclusive");

#[cfg(not(any(feature = "ndarray", feature = "wgpu", feature = "cuda")))]
compile_error!("enable one backend feature: `ndarray`, `wgpu`, or `cuda`");

#[cfg(all(feature = "ndarray", not(any(feature = "wgpu", feature = "cuda"))))]
mod selected {
    pub type InferenceBackend = burn::backend::NdArray<f32>;

    pub fn device(_index: usize) -> burn::backend::ndarray::NdArrayDevice {
        burn::backend::ndarray::NdArrayDevice::Cpu
    }

    pub const NAME: &str = "ndarray (CPU)";
}

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
mod selected {
    pub type InferenceBackend = burn::backend::Wgpu;

    pub fn device(_index: usize) -> burn::backend::wgpu::WgpuDevice {
        burn::backend::wgpu::WgpuDevice::default()
    }

    pub const NAME: &str = "wgpu";
}

#[cfg(feature = "cuda")]
mod selected {
    pub type InferenceBackend = burn::backend::Cuda<f32, i32>;

    pub fn device(index: usize) -> burn::backend::cuda::CudaDevice {
        burn::backend::cuda::CudaDevice::new(index)
    }

    pub const NAME: &str = "cuda";
}

/// Backend used for validation and test passes.
pub type InferenceBackend = selected::InferenceBackend;

/// Autodiff wrapper of the selected backend, used for training.
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Device for the given accelerator index (ignored on CPU backends).
pub fn default_device(index: usize) -> <InferenceBackend as burn::tensor::backend::Backend>::Device {
    selected::device(index)
}

/// Human-readable name of the compiled backend.
pub fn backend_name() -> &'static str {
    selected::NAME
}

#[cfg(all(test, feature = "ndarray", not(any(feature = "wgpu", feature = "cuda"))))]
mod tests {
    use super::*;

    #[test]
    fn any_index_maps_to_the_cpu_device() {
        assert_eq!(default_device(0), default_device(3));
    }

    #[test]
    fn training_device_type_matches_inference_device() {
        // The autodiff wrapper shares the inner backend's device type, so
        // one configured device can drive train and eval loaders alike.
        let device: <TrainingBackend as burn::tensor::backend::Backend>::Device =
            default_device(0);
        let _: <InferenceBackend as burn::tensor::backend::Backend>::Device = device;
    }
}
