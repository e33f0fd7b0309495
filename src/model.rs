use crate::data::DigitBatch;
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The two layer stacks a model can be built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    /// conv → pool → conv → pool → dropout → dense.
    ConvNet,
    /// conv → conv → pool → dropout → dense → dropout → dense.
    DeepConvNet,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConvNet => f.write_str("conv-net"),
            Self::DeepConvNet => f.write_str("deep-conv-net"),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "conv-net" | "convnet" => Ok(Self::ConvNet),
            "deep-conv-net" | "deepconvnet" => Ok(Self::DeepConvNet),
            other => Err(format!(
                "unknown architecture `{other}`, expected `conv-net` or `deep-conv-net`"
            )),
        }
    }
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = "Architecture::ConvNet")]
    pub architecture: Architecture,
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 28)]
    pub height: usize,
    #[config(default = 28)]
    pub width: usize,
}

/// Spatial size after an unpadded 3x3 convolution.
fn conv_out(size: usize) -> usize {
    size.saturating_sub(2)
}

/// Spatial size after a 2x2 max pool with stride 2.
fn pool_out(size: usize) -> usize {
    size / 2
}

fn conv3x3<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3]).init(device)
}

fn max_pool2x2() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()
}

impl ModelConfig {
    /// Builds the configured architecture.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitModel<B> {
        match self.architecture {
            Architecture::ConvNet => DigitModel::ConvNet(self.init_conv_net(device)),
            Architecture::DeepConvNet => DigitModel::DeepConvNet(self.init_deep_conv_net(device)),
        }
    }

    pub fn init_conv_net<B: Backend>(&self, device: &B::Device) -> ConvNet<B> {
        let height = pool_out(conv_out(pool_out(conv_out(self.height))));
        let width = pool_out(conv_out(pool_out(conv_out(self.width))));

        ConvNet {
            conv1: conv3x3([1, 32], device),
            conv2: conv3x3([32, 64], device),
            pool: max_pool2x2(),
            dropout: DropoutConfig::new(0.5).init(),
            output: LinearConfig::new(64 * height * width, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    pub fn init_deep_conv_net<B: Backend>(&self, device: &B::Device) -> DeepConvNet<B> {
        let height = pool_out(conv_out(conv_out(self.height)));
        let width = pool_out(conv_out(conv_out(self.width)));

        DeepConvNet {
            conv1: conv3x3([1, 32], device),
            conv2: conv3x3([32, 64], device),
            pool: max_pool2x2(),
            dropout_features: DropoutConfig::new(0.25).init(),
            hidden: LinearConfig::new(64 * height * width, 128).init(device),
            dropout_hidden: DropoutConfig::new(0.5).init(),
            output: LinearConfig::new(128, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// A network mapping channels-last digit images to class logits.
pub trait DigitClassifier<B: Backend> {
    /// # Shapes
    ///   - Images `[batch_size, height, width, 1]`
    ///   - Output `[batch_size, num_classes]`
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    fn forward_classification(&self, batch: DigitBatch<B>) -> ClassificationOutput<B> {
        let targets = batch.targets;
        let output = self.forward(batch.images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

/// Convolutions expect channels first.
fn channels_first<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    images.permute([0, 3, 1, 2])
}

#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> DigitClassifier<B> for ConvNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = channels_first(images);

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.pool.forward(x);
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(x);

        self.output.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct DeepConvNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout_features: Dropout,
    hidden: Linear<B>,
    dropout_hidden: Dropout,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> DigitClassifier<B> for DeepConvNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = channels_first(images);

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool.forward(x);
        let x = self.dropout_features.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.activation.forward(self.hidden.forward(x));
        let x = self.dropout_hidden.forward(x);

        self.output.forward(x)
    }
}

impl<B: AutodiffBackend> TrainStep<DigitBatch<B>, ClassificationOutput<B>> for ConvNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<DigitBatch<B>, ClassificationOutput<B>> for ConvNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch)
    }
}

impl<B: AutodiffBackend> TrainStep<DigitBatch<B>, ClassificationOutput<B>> for DeepConvNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<DigitBatch<B>, ClassificationOutput<B>> for DeepConvNet<B> {
    fn step(&self, batch: DigitBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch)
    }
}

/// Either architecture, chosen at runtime.
#[derive(Clone, Debug)]
pub enum DigitModel<B: Backend> {
    ConvNet(ConvNet<B>),
    DeepConvNet(DeepConvNet<B>),
}

impl<B: Backend> DigitModel<B> {
    pub fn architecture(&self) -> Architecture {
        match self {
            Self::ConvNet(_) => Architecture::ConvNet,
            Self::DeepConvNet(_) => Architecture::DeepConvNet,
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Self::ConvNet(model) => model.num_params(),
            Self::DeepConvNet(model) => model.num_params(),
        }
    }
}

impl<B: Backend> DigitClassifier<B> for DigitModel<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Self::ConvNet(model) => model.forward(images),
            Self::DeepConvNet(model) => model.forward(images),
        }
    }
}
