//! Saving and loading trained models
//!
//! A model is stored as two companion files in one directory:
//! - `model_info.pth`: JSON metadata, at least `{"output_dim": N}`
//! - `model.pth`: full-precision named MessagePack record of the parameters
//!
//! Both are written by `save_artifacts` and read back together by
//! `load_model`, which refuses a pair whose shapes disagree.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DEFAULT_BASE_CHANNELS;
use crate::model::{record_shape, Classifier, ResNet, ResNetConfig, ResNetRecord};
use crate::utils::error::{Result, TrainError};

/// Metadata file name
pub const MODEL_INFO_FILE: &str = "model_info.pth";

/// Parameter file name
pub const MODEL_FILE: &str = "model.pth";

type ParamRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Reconstruction metadata stored next to the parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Number of output classes
    pub output_dim: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_channels: Option<usize>,

    /// Side length the model was trained on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<usize>,

    /// Class directory names, in label order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_names: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl ModelInfo {
    pub fn new(output_dim: usize) -> Self {
        Self {
            output_dim,
            base_channels: None,
            image_size: None,
            class_names: None,
            saved_at: None,
        }
    }

    pub fn with_base_channels(mut self, base_channels: usize) -> Self {
        self.base_channels = Some(base_channels);
        self
    }

    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = Some(image_size);
        self
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = Some(class_names);
        self
    }

    /// Model configuration described by this metadata
    pub fn model_config(&self) -> ResNetConfig {
        ResNetConfig::new(self.output_dim)
            .with_base_channels(self.base_channels.unwrap_or(DEFAULT_BASE_CHANNELS))
    }

    /// Name of class `index`, when class names were recorded
    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.class_names
            .as_ref()
            .and_then(|names| names.get(index))
            .map(String::as_str)
    }
}

/// Locations of a saved artifact pair
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub info: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(model_dir: &Path) -> Self {
        Self {
            info: model_dir.join(MODEL_INFO_FILE),
            model: model_dir.join(MODEL_FILE),
        }
    }
}

/// A model rebuilt from disk, ready for inference
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub model: ResNet<B>,
    pub info: ModelInfo,
}

/// Write `model_info.pth` and `model.pth` into `model_dir`, creating it when
/// absent. `info.output_dim` must match the model's output size.
///
/// The parameters are written first and each file is replaced by a rename,
/// so a failed save never leaves new metadata without its parameters.
pub fn save_artifacts<B: Backend>(
    model: &ResNet<B>,
    info: &ModelInfo,
    model_dir: &Path,
) -> Result<ArtifactPaths> {
    if info.output_dim != model.num_classes() {
        return Err(TrainError::Model(format!(
            "metadata output_dim {} does not match model output size {}",
            info.output_dim,
            model.num_classes()
        )));
    }

    fs::create_dir_all(model_dir)?;
    let paths = ArtifactPaths::in_dir(model_dir);

    let mut info = info.clone();
    info.base_channels = Some(model.base_channels());
    if info.saved_at.is_none() {
        info.saved_at = Some(Utc::now());
    }
    let metadata = serde_json::to_string_pretty(&info)?;

    // Records are device independent; tensors are read back to host memory
    let bytes = Recorder::<B>::record(&ParamRecorder::default(), model.clone().into_record(), ())
        .map_err(|e| TrainError::Serialization(format!("Failed to encode parameters: {:?}", e)))?;

    replace_file(&paths.model, &bytes)?;
    replace_file(&paths.info, metadata.as_bytes())?;

    info!(
        "Saved model ({} classes) to {:?}",
        info.output_dim, model_dir
    );

    Ok(paths)
}

/// Write `contents` next to `path`, then rename over it
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, contents)?;
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}

/// Read metadata only
pub fn load_model_info(model_dir: &Path) -> Result<ModelInfo> {
    let path = model_dir.join(MODEL_INFO_FILE);
    let text = fs::read_to_string(&path)
        .map_err(|e| TrainError::artifact_load(&path, e.to_string()))?;
    let info: ModelInfo = serde_json::from_str(&text)
        .map_err(|e| TrainError::artifact_load(&path, format!("invalid metadata: {}", e)))?;

    if info.output_dim == 0 {
        return Err(TrainError::artifact_load(&path, "output_dim must be at least 1"));
    }

    Ok(info)
}

/// Rebuild the model saved in `model_dir`.
///
/// `B` should be an inference backend (no autodiff); the returned model
/// evaluates with running batch-norm statistics.
pub fn load_model<B: Backend>(model_dir: &Path, device: &B::Device) -> Result<LoadedModel<B>> {
    let info = load_model_info(model_dir)?;
    let model_path = model_dir.join(MODEL_FILE);

    let bytes =
        fs::read(&model_path).map_err(|e| TrainError::artifact_load(&model_path, e.to_string()))?;
    let record: ResNetRecord<B> = Recorder::<B>::load(&ParamRecorder::default(), bytes, device)
        .map_err(|e| TrainError::artifact_load(&model_path, format!("invalid parameters: {:?}", e)))?;

    let (base_channels, num_classes) = record_shape(&record);
    if num_classes != info.output_dim {
        return Err(TrainError::artifact_load(
            &model_path,
            format!(
                "parameters have {} outputs but metadata says output_dim {}",
                num_classes, info.output_dim
            ),
        ));
    }
    if let Some(expected) = info.base_channels {
        if expected != base_channels {
            return Err(TrainError::artifact_load(
                &model_path,
                format!(
                    "parameters have {} base channels but metadata says {}",
                    base_channels, expected
                ),
            ));
        }
    }

    let model = info
        .model_config()
        .with_base_channels(base_channels)
        .init::<B>(device)
        .load_record(record);

    if model.num_classes() != info.output_dim {
        return Err(TrainError::artifact_load(
            &model_path,
            "rebuilt model does not match metadata",
        ));
    }

    Ok(LoadedModel { model, info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn small_model(classes: usize) -> ResNet<CpuBackend> {
        ResNetConfig::new(classes)
            .with_base_channels(4)
            .init(&Default::default())
    }

    #[test]
    fn test_model_info_minimal_json() {
        let info: ModelInfo = serde_json::from_str(r#"{"output_dim": 7}"#).unwrap();
        assert_eq!(info, ModelInfo::new(7));
        assert_eq!(info.model_config().base_channels, DEFAULT_BASE_CHANNELS);

        let json = serde_json::to_string(&ModelInfo::new(2)).unwrap();
        assert_eq!(json, r#"{"output_dim":2}"#);
    }

    #[test]
    fn test_class_name_lookup() {
        let info = ModelInfo::new(2).with_class_names(vec!["cat".into(), "dog".into()]);
        assert_eq!(info.class_name(1), Some("dog"));
        assert_eq!(info.class_name(2), None);
        assert_eq!(ModelInfo::new(2).class_name(0), None);
    }

    #[test]
    fn test_save_creates_directory_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("nested").join("model");

        let paths = save_artifacts(&small_model(3), &ModelInfo::new(3), &model_dir).unwrap();

        assert!(paths.info.ends_with(MODEL_INFO_FILE));
        assert!(paths.model.ends_with(MODEL_FILE));
        assert!(paths.model.exists());

        let info = load_model_info(&model_dir).unwrap();
        assert_eq!(info.output_dim, 3);
        assert_eq!(info.base_channels, Some(4));
        assert!(info.saved_at.is_some());
    }

    #[test]
    fn test_save_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        save_artifacts(&small_model(2), &ModelInfo::new(2), dir.path()).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![MODEL_FILE, MODEL_INFO_FILE]);
    }

    #[test]
    fn test_failed_parameter_write_leaves_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the parameter file's place makes the rename fail
        fs::create_dir(dir.path().join(MODEL_FILE)).unwrap();
        fs::write(dir.path().join(MODEL_FILE).join("keep"), b"x").unwrap();

        let result = save_artifacts(&small_model(3), &ModelInfo::new(3), dir.path());

        assert!(matches!(result, Err(TrainError::Io(_))));
        assert!(!dir.path().join(MODEL_INFO_FILE).exists());
        assert!(!dir.path().join(format!("{}.tmp", MODEL_FILE)).exists());
    }

    #[test]
    fn test_save_rejects_wrong_output_dim() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_artifacts(&small_model(3), &ModelInfo::new(4), dir.path());
        assert!(matches!(result, Err(TrainError::Model(_))));
    }

    #[test]
    fn test_missing_files_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_model::<CpuBackend>(dir.path(), &Default::default());
        assert!(matches!(result, Err(TrainError::ArtifactLoad { .. })));

        fs::write(dir.path().join(MODEL_INFO_FILE), r#"{"output_dim": 3}"#).unwrap();
        let result = load_model::<CpuBackend>(dir.path(), &Default::default());
        assert!(matches!(result, Err(TrainError::ArtifactLoad { .. })));
    }

    #[test]
    fn test_mismatched_metadata_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        save_artifacts(&small_model(3), &ModelInfo::new(3), dir.path()).unwrap();

        fs::write(dir.path().join(MODEL_INFO_FILE), r#"{"output_dim": 5}"#).unwrap();
        let result = load_model::<CpuBackend>(dir.path(), &Default::default());
        assert!(matches!(result, Err(TrainError::ArtifactLoad { .. })));
    }

    #[test]
    fn test_garbage_parameters_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MODEL_INFO_FILE), r#"{"output_dim": 3}"#).unwrap();
        fs::write(dir.path().join(MODEL_FILE), b"not a record").unwrap();

        let result = load_model::<CpuBackend>(dir.path(), &Default::default());
        assert!(matches!(result, Err(TrainError::ArtifactLoad { .. })));
    }
}
