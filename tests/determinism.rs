//! Kept in its own test binary: the CPU backend's seed is process-wide,
//! so no other test may initialise models concurrently.

mod common;

use resnet_trainer::backend::{CpuTrainingBackend, RunContext};
use resnet_trainer::training::run_training;
use resnet_trainer::utils::logging::MemoryReporter;

use common::write_image_folder;

#[test]
fn same_seed_same_data_same_loss() {
    let data = tempfile::tempdir().unwrap();
    write_image_folder(&data.path().join("train"), 3, 8);
    write_image_folder(&data.path().join("valid"), 3, 2);

    let run = |name: &str| {
        let mut config = resnet_trainer::RunConfig::new(
            data.path().join(name).join("output"),
            data.path().join(name).join("model"),
            data.path().join("train"),
            data.path().join("valid"),
        );
        config.image_size = 32;
        config.base_channels = 4;
        config.batch_size = 5;
        config.epochs = 2;
        config.seed = 42;

        let context = RunContext::<CpuTrainingBackend>::seeded(Default::default(), config.seed);
        let reporter = MemoryReporter::new();
        let outcome = run_training(&config, context, &reporter).unwrap();
        (outcome.history, reporter.messages_starting_with("Train Epoch:"))
    };

    let (first, first_lines) = run("a");
    let (second, second_lines) = run("b");

    assert_eq!(first.final_train_loss(), second.final_train_loss());
    assert_eq!(
        first.final_validation().map(|v| v.avg_loss),
        second.final_validation().map(|v| v.avg_loss)
    );
    assert_eq!(first_lines, second_lines);
}
