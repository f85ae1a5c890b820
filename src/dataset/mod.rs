//! Dataset module for class-per-directory image data
//!
//! - `folder`: discovery of class directories and image decoding
//! - `batcher`: Burn `Batcher` turning decoded images into tensors
//! - `loader`: seeded, per-epoch shuffling batch iteration

pub mod batcher;
pub mod folder;
pub mod loader;

pub use batcher::{ImageBatch, ImageBatcher};
pub use folder::{is_image_file, load_image_tensor, ImageFolder, ImageItem, ImageSample};
pub use loader::{build_loaders, BatchLoader, EpochBatches};
