//! Burn Batcher for decoded images

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

use super::folder::ImageItem;

/// A batch of images for training or evaluation
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stacks `ImageItem`s into device tensors
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    image_size: usize,
}

impl ImageBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.iter().copied())
            .collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ImageBatch { images, targets }
    }
}
