//! ResNet-18 image classifier
//!
//! Architecture:
//! - Stem: Conv 7x7 stride 2, BatchNorm, ReLU, MaxPool 3x3 stride 2
//! - 4 residual stages of 2 basic blocks each; stages 2-4 halve the
//!   spatial size and double the channels
//! - Global average pooling
//! - Fully connected layer producing one logit per class

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::Classifier;

/// Blocks per stage (ResNet-18 layout)
const BLOCKS_PER_STAGE: usize = 2;

/// Configuration for the ResNet classifier
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Channels of the first residual stage; later stages use 2x, 4x, 8x
    #[config(default = "64")]
    pub base_channels: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,
}

impl ResNetConfig {
    /// Initialize a model with freshly drawn parameters
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        ResNet::new(self, device)
    }
}

/// 1x1 strided projection used when a block changes shape
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        Self { conv, bn }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Two 3x3 convolutions with an identity (or projected) shortcut
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
    activation: Relu,
}

impl<B: Backend> BasicBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(out_channels).init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn2 = BatchNormConfig::new(out_channels).init(device);

        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample::new(in_channels, out_channels, stride, device))
        } else {
            None
        };

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.bn1.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);

        self.activation.forward(x.add(identity))
    }

    /// Whether the block carries a projection shortcut
    pub fn has_downsample(&self) -> bool {
        self.downsample.is_some()
    }
}

/// ResNet-18 classifier
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    maxpool: MaxPool2d,
    blocks: Vec<BasicBlock<B>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    activation: Relu,
}

impl<B: Backend> ResNet<B> {
    pub fn new(config: &ResNetConfig, device: &B::Device) -> Self {
        let base = config.base_channels;

        let conv1 = Conv2dConfig::new([config.in_channels, base], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(base).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // base -> base -> 2x -> 4x -> 8x
        let mut blocks = Vec::with_capacity(4 * BLOCKS_PER_STAGE);
        let mut in_channels = base;
        for stage in 0..4 {
            let out_channels = base << stage;
            for block in 0..BLOCKS_PER_STAGE {
                let stride = if stage > 0 && block == 0 { 2 } else { 1 };
                blocks.push(BasicBlock::new(in_channels, out_channels, stride, device));
                in_channels = out_channels;
            }
        }

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.num_classes).init(device);

        Self {
            conv1,
            bn1,
            maxpool,
            blocks,
            avgpool,
            fc,
            activation: Relu::new(),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `input` - Tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits of shape [batch_size, num_classes]
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(input);
        let x = self.bn1.forward(x);
        let x = self.activation.forward(x);
        let x = self.maxpool.forward(x);

        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        let x = self.avgpool.forward(x);
        let [batch, channels, _, _] = x.dims();
        self.fc.forward(x.reshape([batch, channels]))
    }

    pub fn blocks(&self) -> &[BasicBlock<B>] {
        &self.blocks
    }

    /// Width of the first stage
    pub fn base_channels(&self) -> usize {
        self.conv1.weight.val().dims()[0]
    }
}

/// (base_channels, num_classes) encoded in a parameter record
pub fn record_shape<B: Backend>(record: &ResNetRecord<B>) -> (usize, usize) {
    let base_channels = record.conv1.weight.val().dims()[0];
    let num_classes = record.fc.weight.val().dims()[1];
    (base_channels, num_classes)
}

impl<B: Backend> Classifier<B> for ResNet<B> {
    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }

    fn num_classes(&self) -> usize {
        // Linear weights are stored as [d_input, d_output]
        self.fc.weight.val().dims()[1]
    }
}
