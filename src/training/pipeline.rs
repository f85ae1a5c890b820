//! End-to-end training run
//!
//! loaders -> model -> fit -> artifacts -> run summary

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trainer::{Trainer, TrainingHistory};
use crate::backend::RunContext;
use crate::config::RunConfig;
use crate::dataset::build_loaders;
use crate::inference::persistence::{save_artifacts, ArtifactPaths, ModelInfo};
use crate::model::{Classifier, ResNetConfig};
use crate::utils::error::Result;
use crate::utils::format_duration;
use crate::utils::logging::Reporter;
use crate::utils::metrics::ConfusionMatrix;

/// Run summary file written to the output data directory
pub const SUMMARY_FILE: &str = "training_summary.json";

/// Confusion matrix of the last evaluation
pub const CONFUSION_FILE: &str = "validation_confusion.csv";

/// Contents of `training_summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub config: RunConfig,
    pub class_names: Vec<String>,
    pub parameters: usize,
    pub history: TrainingHistory,
    pub elapsed_seconds: f64,
    pub finished_at: DateTime<Utc>,
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub history: TrainingHistory,
    pub artifacts: ArtifactPaths,
    pub summary_path: PathBuf,
    pub elapsed_seconds: f64,
}

/// Train a classifier as described by `config` and persist the result.
///
/// Dataset and configuration problems are reported before the first
/// training step.
pub fn run_training<B: AutodiffBackend>(
    config: &RunConfig,
    context: RunContext<B>,
    reporter: &dyn Reporter,
) -> Result<RunOutcome> {
    config.validate()?;
    let start = Instant::now();

    let (mut train_loader, mut valid_loader) = build_loaders(config)?;
    let class_names = train_loader.folder().class_names().to_vec();

    let model = ResNetConfig::new(config.output_dim)
        .with_base_channels(config.base_channels)
        .init::<B>(&context.device);
    let parameters = model.param_count();
    reporter.info(&format!(
        "Model: ResNet-18, {} classes, {} parameters",
        model.num_classes(),
        parameters
    ));

    let mut trainer = Trainer::new(model, config.learning_rate, context);
    reporter.info(&format!(
        "Optimizer: SGD, learning rate {}, batch size {}, epochs {}",
        trainer.learning_rate(),
        config.batch_size,
        config.epochs
    ));
    let history = trainer.fit(
        &mut train_loader,
        &mut valid_loader,
        config.epochs,
        reporter,
    )?;

    let confusion = trainer.last_evaluation().map(|e| e.confusion.clone());
    let model = trainer.into_model().valid();

    let info = ModelInfo::new(config.output_dim)
        .with_image_size(config.image_size)
        .with_class_names(class_names.clone());
    let artifacts = save_artifacts(&model, &info, &config.model_dir)?;
    reporter.info(&format!(
        "Saved {} and {}",
        artifacts.info.display(),
        artifacts.model.display()
    ));

    let elapsed = start.elapsed().as_secs_f64();
    let summary = RunSummary {
        config: config.clone(),
        class_names,
        parameters,
        history: history.clone(),
        elapsed_seconds: elapsed,
        finished_at: Utc::now(),
    };
    let summary_path = write_summary(&config.output_data_dir, &summary)?;
    if let Some(confusion) = confusion {
        for (name, accuracy) in per_class_lines(&summary.class_names, &confusion) {
            reporter.debug(&format!("  {:<24} {}", name, accuracy));
        }
        confusion.save_csv(&config.output_data_dir.join(CONFUSION_FILE))?;
    }

    reporter.info(&format!("Run summary written to {}", summary_path.display()));
    reporter.info(&format!("Training finished in {}", format_duration(elapsed)));

    Ok(RunOutcome {
        history,
        artifacts,
        summary_path,
        elapsed_seconds: elapsed,
    })
}

/// (class name, formatted per-class validation accuracy)
fn per_class_lines<'a>(
    class_names: &'a [String],
    confusion: &ConfusionMatrix,
) -> impl Iterator<Item = (&'a str, String)> {
    let accuracies = confusion.per_class_accuracy();
    class_names
        .iter()
        .zip(accuracies)
        .map(|(name, accuracy)| {
            let text = match accuracy {
                Some(acc) => format!("{:.2}%", acc),
                None => "n/a".to_string(),
            };
            (name.as_str(), text)
        })
}

fn write_summary(output_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(SUMMARY_FILE);
    fs::write(&path, serde_json::to_string_pretty(summary)?)?;
    Ok(path)
}
