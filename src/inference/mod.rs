//! Inference module: model artifacts and prediction
//!
//! - `persistence`: writing and restoring `model_info.pth` + `model.pth`
//! - `predictor`: classifying image files with a restored model

pub mod persistence;
pub mod predictor;

pub use persistence::{
    load_model, load_model_info, save_artifacts, ArtifactPaths, LoadedModel, ModelInfo,
    MODEL_FILE, MODEL_INFO_FILE,
};
pub use predictor::{PredictionResult, Predictor};
