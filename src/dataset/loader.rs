//! Shuffling batch loader
//!
//! Each call to `epoch` reshuffles the sample order from the loader's
//! seeded RNG and yields batches of `batch_size` (the last one may be
//! smaller). Every sample appears exactly once per epoch.

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

use super::batcher::{ImageBatch, ImageBatcher};
use super::folder::{ImageFolder, ImageItem};
use crate::config::RunConfig;
use crate::utils::error::{Result, TrainError};

/// Restartable, shuffled batch source over an `ImageFolder`
pub struct BatchLoader {
    folder: ImageFolder,
    batch_size: usize,
    image_size: usize,
    batcher: ImageBatcher,
    rng: ChaCha8Rng,
    /// Decoding threads; `None` decodes on the calling thread
    pool: Option<rayon::ThreadPool>,
}

impl BatchLoader {
    /// `stream` separates the shuffle sequences of loaders sharing a seed
    pub fn new(
        folder: ImageFolder,
        batch_size: usize,
        image_size: usize,
        seed: u64,
        stream: u64,
        num_workers: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(TrainError::Config("batch_size must be greater than 0".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);

        let pool = if num_workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("image-loader-{}", i))
                .build()
                .map_err(|e| TrainError::Config(format!("Failed to build loader pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            folder,
            batch_size,
            image_size,
            batcher: ImageBatcher::new(image_size),
            rng,
            pool,
        })
    }

    pub fn folder(&self) -> &ImageFolder {
        &self.folder
    }

    /// Number of samples per epoch
    pub fn len(&self) -> usize {
        self.folder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folder.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `ceil(len / batch_size)`
    pub fn num_batches(&self) -> usize {
        self.folder.len().div_ceil(self.batch_size)
    }

    /// Fresh permutation of the sample indices; advances the RNG
    pub fn shuffled_indices(&mut self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.folder.len()).collect();
        indices.shuffle(&mut self.rng);
        indices
    }

    /// Start a new pass over the data in a newly shuffled order
    pub fn epoch<B: Backend>(&mut self, device: &B::Device) -> EpochBatches<'_, B> {
        let order = self.shuffled_indices();
        EpochBatches {
            loader: &*self,
            order,
            position: 0,
            device: device.clone(),
        }
    }

    fn load_items(&self, indices: &[usize]) -> Result<Vec<ImageItem>> {
        let folder = &self.folder;
        let size = self.image_size;

        match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| folder.load_item(i, size))
                    .collect()
            }),
            None => indices.iter().map(|&i| folder.load_item(i, size)).collect(),
        }
    }
}

/// Batches of one epoch; a decode failure is yielded as an error
pub struct EpochBatches<'a, B: Backend> {
    loader: &'a BatchLoader,
    order: Vec<usize>,
    position: usize,
    device: B::Device,
}

impl<B: Backend> Iterator for EpochBatches<'_, B> {
    type Item = Result<ImageBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }

        let end = (self.position + self.loader.batch_size).min(self.order.len());
        let chunk = &self.order[self.position..end];
        self.position = end;

        let batcher = &self.loader.batcher;
        let device = &self.device;
        Some(self.loader.load_items(chunk).map(|items| {
            <ImageBatcher as Batcher<B, ImageItem, ImageBatch<B>>>::batch(batcher, items, device)
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.position).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

/// Build the training and validation loaders for a run.
///
/// Both directories must exist, contain images, and share the same class
/// list; the class count may not exceed `output_dim`.
pub fn build_loaders(config: &RunConfig) -> Result<(BatchLoader, BatchLoader)> {
    let train = ImageFolder::open(&config.train_dir)?;
    let valid = ImageFolder::open(&config.valid_dir)?;

    if train.class_names() != valid.class_names() {
        return Err(TrainError::Config(format!(
            "validation classes {:?} differ from training classes {:?}",
            valid.class_names(),
            train.class_names()
        )));
    }

    if train.num_classes() > config.output_dim {
        return Err(TrainError::Config(format!(
            "dataset has {} classes but output_dim is {}",
            train.num_classes(),
            config.output_dim
        )));
    }

    log_stats("train", &train);
    log_stats("validation", &valid);

    let train_loader = BatchLoader::new(
        train,
        config.batch_size,
        config.image_size,
        config.seed,
        0,
        config.num_workers,
    )?;
    let valid_loader = BatchLoader::new(
        valid,
        config.batch_size,
        config.image_size,
        config.seed,
        1,
        config.num_workers,
    )?;

    Ok((train_loader, valid_loader))
}

fn log_stats(split: &str, folder: &ImageFolder) {
    info!(
        "{} set: {} samples from {}",
        split,
        folder.len(),
        folder.root().display()
    );
    for (name, count) in folder.class_names().iter().zip(folder.class_counts()) {
        info!("  {:<24} {:>6}", name, count);
    }
}
