//! # ResNet Trainer
//!
//! Trains a ResNet-18 image classifier on a class-per-directory image
//! dataset with the Burn framework and stores the result as a pair of
//! companion files (`model_info.pth` + `model.pth`) that an inference
//! process can rebuild the model from.
//!
//! ## Modules
//!
//! - `config`: run configuration and its defaults
//! - `backend`: CPU/CUDA backend selection and the per-run context
//! - `dataset`: image folder discovery, batching and shuffled loading
//! - `model`: the `Classifier` trait and the ResNet-18 implementation
//! - `training`: SGD epoch loop, evaluation and the end-to-end run
//! - `inference`: artifact persistence and prediction
//! - `utils`: errors, logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resnet_trainer::backend::{CpuTrainingBackend, RunContext};
//! use resnet_trainer::utils::TracingReporter;
//! use resnet_trainer::{run_training, RunConfig};
//!
//! let config = RunConfig::new("out", "model", "data/train", "data/valid");
//! let context = RunContext::<CpuTrainingBackend>::seeded(Default::default(), config.seed);
//! let outcome = run_training(&config, context, &TracingReporter)?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{DevicePreference, RunConfig};
pub use dataset::{BatchLoader, ImageBatch, ImageBatcher, ImageFolder};
pub use inference::{load_model, save_artifacts, ModelInfo, Predictor};
pub use model::{Classifier, ResNet, ResNetConfig};
pub use training::{run_training, EvalSummary, Trainer, TrainingHistory};
pub use utils::error::{Result, TrainError};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
