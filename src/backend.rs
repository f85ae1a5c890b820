//! Backend abstraction - device selection and run context
//!
//! The CPU (NdArray) backend is always compiled. With the `cuda` feature
//! the CUDA backend is used whenever a GPU is detected; otherwise the run
//! falls back to the CPU without failing.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;
use tracing::info;

use crate::config::DevicePreference;

/// CPU inference backend
pub type CpuBackend = burn_ndarray::NdArray<f32>;

/// CPU training backend
pub type CpuTrainingBackend = Autodiff<CpuBackend>;

#[cfg(feature = "cuda")]
pub type GpuBackend = burn_cuda::Cuda;

#[cfg(feature = "cuda")]
pub type GpuTrainingBackend = Autodiff<GpuBackend>;

/// Device chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedDevice {
    Cpu,
    Gpu(usize),
}

impl std::fmt::Display for SelectedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectedDevice::Cpu => write!(f, "NdArray (CPU)"),
            SelectedDevice::Gpu(id) => write!(f, "CUDA (GPU:{})", id),
        }
    }
}

/// Pick the device for this run. An unavailable accelerator is not an error.
pub fn select_device(preference: DevicePreference) -> SelectedDevice {
    if preference == DevicePreference::Cpu {
        return SelectedDevice::Cpu;
    }

    if !cfg!(feature = "cuda") {
        info!("Built without the `cuda` feature, using CPU");
        return SelectedDevice::Cpu;
    }

    if has_nvidia_gpu() {
        SelectedDevice::Gpu(0)
    } else {
        info!("No GPU detected, falling back to CPU");
        SelectedDevice::Cpu
    }
}

/// Check for an NVIDIA GPU (CUDA)
fn has_nvidia_gpu() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::path::Path::new("/proc/driver/nvidia/version").exists()
            || std::path::Path::new("/dev/nvidia0").exists()
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("nvidia-smi.exe")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        false
    }
}

/// Device and seed shared by every component of a run
#[derive(Debug, Clone)]
pub struct RunContext<B: Backend> {
    pub device: B::Device,
    pub seed: u64,
}

impl<B: Backend> RunContext<B> {
    /// Build the context and seed the backend's parameter initialisation RNG
    pub fn seeded(device: B::Device, seed: u64) -> Self {
        B::seed(&device, seed);
        Self { device, seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_preference_always_wins() {
        assert_eq!(select_device(DevicePreference::Cpu), SelectedDevice::Cpu);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_auto_without_cuda_falls_back() {
        assert_eq!(select_device(DevicePreference::Auto), SelectedDevice::Cpu);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(SelectedDevice::Cpu.to_string(), "NdArray (CPU)");
        assert_eq!(SelectedDevice::Gpu(1).to_string(), "CUDA (GPU:1)");
    }

    #[test]
    fn test_run_context_keeps_seed() {
        let ctx = RunContext::<CpuBackend>::seeded(Default::default(), 7);
        assert_eq!(ctx.seed, 7);
    }
}
