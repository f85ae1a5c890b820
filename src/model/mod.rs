//! Model module
//!
//! - `Classifier`: what the training loop, evaluation and inference need
//!   from a model
//! - `resnet`: the ResNet-18 implementation
//!
//! Training and inference mode are the two sides of Burn's
//! `AutodiffModule::valid()` conversion: the autodiff model tracks
//! gradients and uses batch statistics, the inner model does neither.

pub mod resnet;

pub use resnet::{record_shape, BasicBlock, ResNet, ResNetConfig, ResNetRecord};

use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

/// An image classifier producing one score per class
pub trait Classifier<B: Backend>: Module<B> {
    /// Logits of shape [batch_size, num_classes] for images [batch_size, 3, H, W]
    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Number of scores produced per input
    fn num_classes(&self) -> usize;

    /// Total number of trainable scalars
    fn param_count(&self) -> usize {
        self.num_params()
    }
}
