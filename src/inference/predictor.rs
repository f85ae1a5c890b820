//! Inference predictor
//!
//! Wraps a model restored by `load_model` and classifies image files with
//! the same preprocessing the training loader applies.

use std::path::{Path, PathBuf};

use burn::tensor::{activation::softmax, backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::persistence::{load_model, LoadedModel, ModelInfo};
use crate::config::DEFAULT_IMAGE_SIZE;
use crate::dataset::{is_image_file, load_image_tensor};
use crate::model::{Classifier, ResNet};
use crate::utils::error::{Result, TrainError};

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub image_path: PathBuf,

    /// Predicted class index
    pub predicted_class: usize,

    /// Class directory name, when the model recorded one
    pub class_name: Option<String>,

    /// Softmax probability of the predicted class
    pub confidence: f32,

    /// Probability distribution over all classes
    pub probabilities: Vec<f32>,
}

impl PredictionResult {
    fn from_probabilities(image_path: PathBuf, probabilities: Vec<f32>, info: &ModelInfo) -> Self {
        let (predicted_class, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((0, 0.0));

        Self {
            image_path,
            predicted_class,
            class_name: info.class_name(predicted_class).map(str::to_string),
            confidence,
            probabilities,
        }
    }

    /// Class name if known, otherwise the index
    pub fn label(&self) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| format!("class {}", self.predicted_class))
    }
}

/// Classifies images with a restored model
pub struct Predictor<B: Backend> {
    model: ResNet<B>,
    info: ModelInfo,
    image_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(loaded: LoadedModel<B>, device: B::Device) -> Self {
        let image_size = loaded.info.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
        Self {
            model: loaded.model,
            info: loaded.info,
            image_size,
            device,
        }
    }

    /// Load the artifacts in `model_dir` onto `device`
    pub fn from_dir(model_dir: &Path, device: B::Device) -> Result<Self> {
        let loaded = load_model::<B>(model_dir, &device)?;
        Ok(Self::new(loaded, device))
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Classify one image file
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let pixels = load_image_tensor(path, self.image_size)?;
        let size = self.image_size;
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(pixels, [1, 3, size, size]),
            &self.device,
        );

        let probabilities = softmax(self.model.predict(images), 1);
        let probabilities: Vec<f32> = probabilities
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| TrainError::Model(format!("Failed to read scores: {:?}", e)))?;

        Ok(PredictionResult::from_probabilities(
            path.to_path_buf(),
            probabilities,
            &self.info,
        ))
    }

    /// Classify a file, or every image below a directory in path order
    pub fn predict_path(&self, path: &Path) -> Result<Vec<PredictionResult>> {
        if path.is_file() {
            return Ok(vec![self.predict_file(path)?]);
        }
        if !path.is_dir() {
            return Err(TrainError::dataset_not_found(path, "no such file or directory"));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        files.iter().map(|file| self.predict_file(file)).collect()
    }
}
