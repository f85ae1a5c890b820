mod common;

use burn::module::AutodiffModule;
use burn::tensor::{Distribution, Tensor};
use resnet_trainer::backend::{CpuBackend, CpuTrainingBackend, RunContext};
use resnet_trainer::dataset::{BatchLoader, ImageFolder};
use resnet_trainer::inference::{load_model, save_artifacts, ModelInfo};
use resnet_trainer::utils::logging::MemoryReporter;
use resnet_trainer::{Classifier, ResNetConfig, Trainer};

use common::write_image_folder;

#[test]
fn trained_model_reloads_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();
    write_image_folder(&dir.path().join("data"), 2, 6);
    let folder = ImageFolder::open(dir.path().join("data")).unwrap();

    let context = RunContext::<CpuTrainingBackend>::seeded(Default::default(), 5);
    let model = ResNetConfig::new(2)
        .with_base_channels(4)
        .init::<CpuTrainingBackend>(&context.device);

    // A few steps so the batch-norm running statistics are non-trivial
    let mut train = BatchLoader::new(folder.clone(), 4, 32, 5, 0, 0).unwrap();
    let mut valid = BatchLoader::new(folder, 4, 32, 5, 1, 0).unwrap();
    let mut trainer = Trainer::new(model, 0.01, context);
    trainer
        .fit(&mut train, &mut valid, 1, &MemoryReporter::new())
        .unwrap();
    let model = trainer.into_model().valid();

    let model_dir = dir.path().join("model");
    save_artifacts(&model, &ModelInfo::new(2), &model_dir).unwrap();

    let device = Default::default();
    let loaded = load_model::<CpuBackend>(&model_dir, &device).unwrap();

    let images = Tensor::<CpuBackend, 4>::random([3, 3, 32, 32], Distribution::Default, &device);
    let before: Vec<f32> = model.predict(images.clone()).into_data().to_vec().unwrap();
    let after: Vec<f32> = loaded.model.predict(images).into_data().to_vec().unwrap();

    assert_eq!(before.len(), 6);
    let before_bits: Vec<u32> = before.iter().map(|v| v.to_bits()).collect();
    let after_bits: Vec<u32> = after.iter().map(|v| v.to_bits()).collect();
    assert_eq!(before_bits, after_bits);
}

#[test]
fn saving_twice_overwrites_the_pair() {
    let dir = tempfile::tempdir().unwrap();
    let device = Default::default();

    let first = ResNetConfig::new(3)
        .with_base_channels(4)
        .init::<CpuBackend>(&device);
    save_artifacts(&first, &ModelInfo::new(3), dir.path()).unwrap();

    let second = ResNetConfig::new(4)
        .with_base_channels(4)
        .init::<CpuBackend>(&device);
    save_artifacts(&second, &ModelInfo::new(4), dir.path()).unwrap();

    let loaded = load_model::<CpuBackend>(dir.path(), &device).unwrap();
    assert_eq!(loaded.info.output_dim, 4);
    assert_eq!(loaded.model.num_classes(), 4);
}
