//! Classify images with a trained model
//!
//! Loads `model_info.pth` + `model.pth` from a model directory and prints
//! the top class and its probability for an image file or every image
//! below a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use resnet_trainer::backend::CpuBackend;
use resnet_trainer::inference::Predictor;
use resnet_trainer::utils::logging::{init_logging, LogConfig};

#[derive(Parser, Debug)]
#[command(name = "predict")]
#[command(about = "Classify images with a trained ResNet model", long_about = None)]
struct Args {
    /// Directory holding model_info.pth and model.pth
    #[arg(long, env = "SM_MODEL_DIR")]
    model_dir: PathBuf,

    /// Image file or directory of images
    #[arg(short, long)]
    input: PathBuf,

    /// Print the full probability distribution
    #[arg(long, default_value = "false")]
    all_scores: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    let predictor = Predictor::<CpuBackend>::from_dir(&args.model_dir, Default::default())
        .with_context(|| format!("Failed to load model from {:?}", args.model_dir))?;

    println!("{}", "Model:".cyan().bold());
    println!("  Classes:    {}", predictor.num_classes());
    println!("  Image size: {}", predictor.image_size());
    println!();

    let results = predictor
        .predict_path(&args.input)
        .with_context(|| format!("Failed to classify {:?}", args.input))?;

    if results.is_empty() {
        println!("{} No images found in {:?}", "Note:".yellow(), args.input);
        return Ok(());
    }

    for result in &results {
        println!(
            "{}  {}  {}",
            result.image_path.display(),
            result.label().green().bold(),
            format!("{:.2}%", result.confidence * 100.0)
        );
        if args.all_scores {
            for (index, probability) in result.probabilities.iter().enumerate() {
                let name = predictor
                    .info()
                    .class_name(index)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("class {}", index));
                println!("    {:<24} {:.4}", name, probability);
            }
        }
    }

    Ok(())
}
