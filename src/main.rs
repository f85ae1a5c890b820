//! ResNet trainer CLI
//!
//! Trains a ResNet-18 classifier on a train/validation pair of image
//! folders and writes `model_info.pth` and `model.pth` to the model
//! directory. Path arguments default to the managed training
//! environment's variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tracing::info;

use resnet_trainer::backend::{select_device, CpuTrainingBackend, RunContext, SelectedDevice};
use resnet_trainer::config::{
    DevicePreference, RunConfig, DEFAULT_BASE_CHANNELS, DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS,
    DEFAULT_IMAGE_SIZE, DEFAULT_LEARNING_RATE, DEFAULT_OUTPUT_DIM, DEFAULT_SEED,
};
use resnet_trainer::training::{run_training, RunOutcome};
use resnet_trainer::utils::logging::{init_logging, LogConfig, TracingReporter};
use resnet_trainer::utils::format_duration;

#[cfg(feature = "cuda")]
use resnet_trainer::backend::GpuTrainingBackend;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceArg {
    /// CUDA when available, otherwise CPU
    Auto,
    /// Always CPU
    Cpu,
}

impl From<DeviceArg> for DevicePreference {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => DevicePreference::Auto,
            DeviceArg::Cpu => DevicePreference::Cpu,
        }
    }
}

/// Train a ResNet-18 image classifier
#[derive(Parser, Debug)]
#[command(name = "resnet_trainer")]
#[command(version)]
#[command(about = "Train a residual CNN image classifier with Burn", long_about = None)]
struct Cli {
    /// Directory for run summaries
    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    output_data_dir: PathBuf,

    /// Directory the model artifacts are written to
    #[arg(long, env = "SM_MODEL_DIR")]
    model_dir: PathBuf,

    /// Training images, one subdirectory per class
    #[arg(long, env = "SM_CHANNEL_TRAIN")]
    data_dir: PathBuf,

    /// Validation images, same class subdirectories as the training set
    #[arg(long, env = "SM_CHANNEL_VALIDATION")]
    valid_dir: PathBuf,

    /// Input batch size for training
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Number of epochs to train
    #[arg(long, default_value_t = DEFAULT_EPOCHS)]
    epochs: usize,

    /// Random seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// SGD learning rate
    #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
    lr: f64,

    /// Number of output classes
    #[arg(long = "output_dim", default_value_t = DEFAULT_OUTPUT_DIM)]
    output_dim: usize,

    /// Side length images are resized to
    #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
    image_size: usize,

    /// Image decoding threads (0 = decode on the training thread)
    #[arg(long, default_value_t = 0)]
    num_workers: usize,

    /// Compute device
    #[arg(long, value_enum, default_value = "auto")]
    device: DeviceArg,

    /// Channels of the first residual stage
    #[arg(long, default_value_t = DEFAULT_BASE_CHANNELS)]
    base_channels: usize,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            seed: self.seed,
            learning_rate: self.lr,
            output_dim: self.output_dim,
            output_data_dir: self.output_data_dir,
            model_dir: self.model_dir,
            train_dir: self.data_dir,
            valid_dir: self.valid_dir,
            image_size: self.image_size,
            num_workers: self.num_workers,
            base_channels: self.base_channels,
            device: self.device.into(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    let config = cli.into_config();
    config.validate().context("Invalid configuration")?;

    print_banner();

    let selected = select_device(config.device);
    info!("Using device {}", selected);

    let outcome = match selected {
        SelectedDevice::Cpu => {
            let context = RunContext::<CpuTrainingBackend>::seeded(Default::default(), config.seed);
            run_training(&config, context, &TracingReporter)
        }
        #[cfg(feature = "cuda")]
        SelectedDevice::Gpu(index) => {
            let context = RunContext::<GpuTrainingBackend>::seeded(
                burn_cuda::CudaDevice::new(index),
                config.seed,
            );
            run_training(&config, context, &TracingReporter)
        }
        #[cfg(not(feature = "cuda"))]
        SelectedDevice::Gpu(_) => {
            let context = RunContext::<CpuTrainingBackend>::seeded(Default::default(), config.seed);
            run_training(&config, context, &TracingReporter)
        }
    }
    .context("Training failed")?;

    print_summary(&outcome);

    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", "ResNet-18 image classifier training".green().bold());
    println!("{}", format!("resnet_trainer v{}", resnet_trainer::VERSION).dimmed());
    println!();
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("{}", "Training Summary:".green().bold());
    for record in &outcome.history.epochs {
        println!(
            "  Epoch {:>3}: train loss {:.4}  val loss {:.4}  val acc {:.2}%",
            record.epoch,
            record.train_loss,
            record.validation.avg_loss,
            record.validation.accuracy
        );
    }
    if let Some(best) = outcome.history.best_epoch() {
        println!(
            "  Best validation accuracy: {} (epoch {})",
            format!("{:.2}%", best.validation.accuracy).green(),
            best.epoch
        );
    }
    println!("  Model info: {}", outcome.artifacts.info.display());
    println!("  Model:      {}", outcome.artifacts.model.display());
    println!("  Summary:    {}", outcome.summary_path.display());
    println!("  Elapsed:    {}", format_duration(outcome.elapsed_seconds));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    const PATHS: [&str; 9] = [
        "resnet_trainer",
        "--output-data-dir",
        "/tmp/out",
        "--model-dir",
        "/tmp/model",
        "--data-dir",
        "/tmp/train",
        "--valid-dir",
        "/tmp/valid",
    ];

    fn parse(extra: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(PATHS.iter().chain(extra).copied())
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.batch_size, 20);
        assert_eq!(cli.epochs, 2);
        assert_eq!(cli.seed, 1);
        assert_eq!(cli.lr, 0.001);
        assert_eq!(cli.output_dim, 3);
        assert_eq!(cli.num_workers, 0);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_output_dim_uses_underscore() {
        let cli = parse(&["--output_dim", "5"]).unwrap();
        assert_eq!(cli.output_dim, 5);

        let err = parse(&["--output-dim", "5"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_paths_required_without_environment() {
        for var in [
            "SM_OUTPUT_DATA_DIR",
            "SM_MODEL_DIR",
            "SM_CHANNEL_TRAIN",
            "SM_CHANNEL_VALIDATION",
        ] {
            std::env::remove_var(var);
        }

        let err = Cli::try_parse_from(["resnet_trainer"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_into_config() {
        let cli = parse(&["--batch-size", "8", "--lr", "0.01", "--device", "cpu"]).unwrap();
        let config = cli.into_config();

        assert_eq!(config.train_dir, PathBuf::from("/tmp/train"));
        assert_eq!(config.valid_dir, PathBuf::from("/tmp/valid"));
        assert_eq!(config.model_dir, PathBuf::from("/tmp/model"));
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.device, DevicePreference::Cpu);
        assert!(config.validate().is_ok());
    }
}
