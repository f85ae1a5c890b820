//! Run configuration
//!
//! Immutable set of values a training run needs. Built once at startup by
//! the CLI and handed to every component.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, TrainError};

/// Output data directory of the managed training environment
pub const ENV_OUTPUT_DATA_DIR: &str = "SM_OUTPUT_DATA_DIR";
/// Directory the model artifacts are written to
pub const ENV_MODEL_DIR: &str = "SM_MODEL_DIR";
/// Training channel directory
pub const ENV_TRAIN_DIR: &str = "SM_CHANNEL_TRAIN";
/// Validation channel directory
pub const ENV_VALID_DIR: &str = "SM_CHANNEL_VALIDATION";

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_EPOCHS: usize = 2;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_OUTPUT_DIM: usize = 3;
pub const DEFAULT_IMAGE_SIZE: usize = 224;
pub const DEFAULT_BASE_CHANNELS: usize = 64;

/// Device preference given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use an accelerator when one is available, otherwise the CPU
    Auto,
    /// Always use the CPU
    Cpu,
}

/// Configuration for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    /// Step size handed to the SGD optimizer
    pub learning_rate: f64,
    /// Number of output classes of the classifier
    pub output_dim: usize,
    pub output_data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub train_dir: PathBuf,
    pub valid_dir: PathBuf,
    /// Side length images are resized to
    pub image_size: usize,
    /// Image decoding threads; 0 decodes on the calling thread
    pub num_workers: usize,
    /// Channel count of the first residual stage
    pub base_channels: usize,
    pub device: DevicePreference,
}

impl RunConfig {
    /// Configuration with default hyperparameters for the given directories
    pub fn new(
        output_data_dir: impl Into<PathBuf>,
        model_dir: impl Into<PathBuf>,
        train_dir: impl Into<PathBuf>,
        valid_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            seed: DEFAULT_SEED,
            learning_rate: DEFAULT_LEARNING_RATE,
            output_dim: DEFAULT_OUTPUT_DIM,
            output_data_dir: output_data_dir.into(),
            model_dir: model_dir.into(),
            train_dir: train_dir.into(),
            valid_dir: valid_dir.into(),
            image_size: DEFAULT_IMAGE_SIZE,
            num_workers: 0,
            base_channels: DEFAULT_BASE_CHANNELS,
            device: DevicePreference::Auto,
        }
    }

    /// Reject values no run can succeed with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TrainError::Config("batch_size must be greater than 0".into()));
        }
        if self.output_dim == 0 {
            return Err(TrainError::Config("output_dim must be greater than 0".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::Config(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        // conv1 + maxpool + three strided stages halve the side five times
        if self.image_size < 32 {
            return Err(TrainError::Config(format!(
                "image_size must be at least 32, got {}",
                self.image_size
            )));
        }
        if self.base_channels == 0 {
            return Err(TrainError::Config("base_channels must be greater than 0".into()));
        }
        for (name, path) in [
            ("output data dir", &self.output_data_dir),
            ("model dir", &self.model_dir),
            ("train dir", &self.train_dir),
            ("validation dir", &self.valid_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(TrainError::Config(format!("{} is empty", name)));
            }
        }
        Ok(())
    }
}
