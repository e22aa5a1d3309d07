//! Convolutional trunks.
//!
//! Every family reduces a `[batch, 3, H, W]` image to a
//! `[batch, FEATURE_CHANNELS, h, w]` feature map, so the classifier head is
//! family-independent. Residual branches pass through a dropout whose rate
//! is the configured stochastic-depth rate; it is inert outside training.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Gelu, GroupNorm, GroupNormConfig,
        PaddingConfig2d, Relu,
    },
    tensor::{activation, backend::Backend, Tensor},
};

use crate::model::BackboneFamily;

/// Feature width shared by all trunk families.
pub const FEATURE_CHANNELS: usize = 128;

/// Trunk registry. `#[derive(Module)]` on the enum keeps the whole trunk a
/// single parameter group for the optimizer.
#[derive(Module, Debug)]
pub enum Trunk<B: Backend> {
    Resnet(ResnetTrunk<B>),
    Efficientnet(EfficientnetTrunk<B>),
    Convnext(ConvnextTrunk<B>),
}

impl<B: Backend> Trunk<B> {
    pub fn new(family: BackboneFamily, drop_path_rate: f64, device: &B::Device) -> Self {
        match family {
            BackboneFamily::Resnet => Trunk::Resnet(ResnetTrunk::new(drop_path_rate, device)),
            BackboneFamily::Efficientnet => {
                Trunk::Efficientnet(EfficientnetTrunk::new(drop_path_rate, device))
            }
            BackboneFamily::Convnext => {
                Trunk::Convnext(ConvnextTrunk::new(drop_path_rate, device))
            }
        }
    }

    /// `[batch, 3, H, W]` -> `[batch, FEATURE_CHANNELS, h, w]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Trunk::Resnet(trunk) => trunk.forward(input),
            Trunk::Efficientnet(trunk) => trunk.forward(input),
            Trunk::Convnext(trunk) => trunk.forward(input),
        }
    }
}

/// ResNet-style trunk: 7x7 stem with max-pool, then two strided residual
/// blocks with projection shortcuts.
#[derive(Module, Debug)]
pub struct ResnetTrunk<B: Backend> {
    stem: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    stem_pool: MaxPool2d,

    block1_conv1: Conv2d<B>,
    block1_bn1: BatchNorm<B, 2>,
    block1_conv2: Conv2d<B>,
    block1_bn2: BatchNorm<B, 2>,
    block1_down: Conv2d<B>,
    block1_down_bn: BatchNorm<B, 2>,

    block2_conv1: Conv2d<B>,
    block2_bn1: BatchNorm<B, 2>,
    block2_conv2: Conv2d<B>,
    block2_bn2: BatchNorm<B, 2>,
    block2_down: Conv2d<B>,
    block2_down_bn: BatchNorm<B, 2>,

    branch_drop: Dropout,
    activation: Relu,
}

impl<B: Backend> ResnetTrunk<B> {
    pub fn new(drop_path_rate: f64, device: &B::Device) -> Self {
        let conv3 = |channels_in: usize, channels_out: usize, stride: usize| {
            Conv2dConfig::new([channels_in, channels_out], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device)
        };
        let down = |channels_in: usize, channels_out: usize| {
            Conv2dConfig::new([channels_in, channels_out], [1, 1])
                .with_stride([2, 2])
                .with_bias(false)
                .init(device)
        };

        Self {
            stem: Conv2dConfig::new([3, 32], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            stem_bn: BatchNormConfig::new(32).init(device),
            stem_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),

            block1_conv1: conv3(32, 64, 2),
            block1_bn1: BatchNormConfig::new(64).init(device),
            block1_conv2: conv3(64, 64, 1),
            block1_bn2: BatchNormConfig::new(64).init(device),
            block1_down: down(32, 64),
            block1_down_bn: BatchNormConfig::new(64).init(device),

            block2_conv1: conv3(64, FEATURE_CHANNELS, 2),
            block2_bn1: BatchNormConfig::new(FEATURE_CHANNELS).init(device),
            block2_conv2: conv3(FEATURE_CHANNELS, FEATURE_CHANNELS, 1),
            block2_bn2: BatchNormConfig::new(FEATURE_CHANNELS).init(device),
            block2_down: down(64, FEATURE_CHANNELS),
            block2_down_bn: BatchNormConfig::new(FEATURE_CHANNELS).init(device),

            branch_drop: DropoutConfig::new(drop_path_rate).init(),
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem.forward(input);
        let x = self.stem_bn.forward(x);
        let x = self.stem_pool.forward(self.activation.forward(x));

        let identity = self.block1_down_bn.forward(self.block1_down.forward(x.clone()));
        let y = self.activation.forward(self.block1_bn1.forward(self.block1_conv1.forward(x)));
        let y = self.block1_bn2.forward(self.block1_conv2.forward(y));
        let x = self.activation.forward(self.branch_drop.forward(y).add(identity));

        let identity = self.block2_down_bn.forward(self.block2_down.forward(x.clone()));
        let y = self.activation.forward(self.block2_bn1.forward(self.block2_conv1.forward(x)));
        let y = self.block2_bn2.forward(self.block2_conv2.forward(y));
        self.activation.forward(self.branch_drop.forward(y).add(identity))
    }
}

/// EfficientNet-style trunk: SiLU stem plus two inverted-bottleneck stages
/// (expand, depthwise stride-2, project).
#[derive(Module, Debug)]
pub struct EfficientnetTrunk<B: Backend> {
    stem: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,

    block1_expand: Conv2d<B>,
    block1_expand_bn: BatchNorm<B, 2>,
    block1_depthwise: Conv2d<B>,
    block1_depthwise_bn: BatchNorm<B, 2>,
    block1_project: Conv2d<B>,
    block1_project_bn: BatchNorm<B, 2>,

    block2_expand: Conv2d<B>,
    block2_expand_bn: BatchNorm<B, 2>,
    block2_depthwise: Conv2d<B>,
    block2_depthwise_bn: BatchNorm<B, 2>,
    block2_project: Conv2d<B>,
    block2_project_bn: BatchNorm<B, 2>,

    branch_drop: Dropout,
}

impl<B: Backend> EfficientnetTrunk<B> {
    pub fn new(drop_path_rate: f64, device: &B::Device) -> Self {
        let pointwise = |channels_in: usize, channels_out: usize| {
            Conv2dConfig::new([channels_in, channels_out], [1, 1])
                .with_bias(false)
                .init(device)
        };
        let depthwise = |channels: usize| {
            Conv2dConfig::new([channels, channels], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(channels)
                .with_bias(false)
                .init(device)
        };

        Self {
            stem: Conv2dConfig::new([3, 32], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device),
            stem_bn: BatchNormConfig::new(32).init(device),

            block1_expand: pointwise(32, 96),
            block1_expand_bn: BatchNormConfig::new(96).init(device),
            block1_depthwise: depthwise(96),
            block1_depthwise_bn: BatchNormConfig::new(96).init(device),
            block1_project: pointwise(96, 64),
            block1_project_bn: BatchNormConfig::new(64).init(device),

            block2_expand: pointwise(64, 192),
            block2_expand_bn: BatchNormConfig::new(192).init(device),
            block2_depthwise: depthwise(192),
            block2_depthwise_bn: BatchNormConfig::new(192).init(device),
            block2_project: pointwise(192, FEATURE_CHANNELS),
            block2_project_bn: BatchNormConfig::new(FEATURE_CHANNELS).init(device),

            branch_drop: DropoutConfig::new(drop_path_rate).init(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = activation::silu(self.stem_bn.forward(self.stem.forward(input)));

        let x = activation::silu(self.block1_expand_bn.forward(self.block1_expand.forward(x)));
        let x = activation::silu(
            self.block1_depthwise_bn.forward(self.block1_depthwise.forward(x)),
        );
        let x = self.block1_project_bn.forward(self.block1_project.forward(x));
        let x = self.branch_drop.forward(x);

        let x = activation::silu(self.block2_expand_bn.forward(self.block2_expand.forward(x)));
        let x = activation::silu(
            self.block2_depthwise_bn.forward(self.block2_depthwise.forward(x)),
        );
        let x = self.block2_project_bn.forward(self.block2_project.forward(x));
        self.branch_drop.forward(x)
    }
}

/// ConvNeXt-style trunk: patchify stem, depthwise 7x7 blocks with an
/// inverted MLP and GELU, group-norm throughout.
#[derive(Module, Debug)]
pub struct ConvnextTrunk<B: Backend> {
    stem: Conv2d<B>,
    stem_norm: GroupNorm<B>,

    block1_depthwise: Conv2d<B>,
    block1_norm: GroupNorm<B>,
    block1_pw1: Conv2d<B>,
    block1_pw2: Conv2d<B>,

    downsample: Conv2d<B>,
    downsample_norm: GroupNorm<B>,

    block2_depthwise: Conv2d<B>,
    block2_norm: GroupNorm<B>,
    block2_pw1: Conv2d<B>,
    block2_pw2: Conv2d<B>,

    branch_drop: Dropout,
    activation: Gelu,
}

impl<B: Backend> ConvnextTrunk<B> {
    pub fn new(drop_path_rate: f64, device: &B::Device) -> Self {
        let depthwise7 = |channels: usize| {
            Conv2dConfig::new([channels, channels], [7, 7])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_groups(channels)
                .init(device)
        };
        let pointwise = |channels_in: usize, channels_out: usize| {
            Conv2dConfig::new([channels_in, channels_out], [1, 1]).init(device)
        };
        // LayerNorm over channels, expressed as a single-group GroupNorm.
        let norm = |channels: usize| GroupNormConfig::new(1, channels).init(device);

        Self {
            stem: Conv2dConfig::new([3, 64], [4, 4]).with_stride([4, 4]).init(device),
            stem_norm: norm(64),

            block1_depthwise: depthwise7(64),
            block1_norm: norm(64),
            block1_pw1: pointwise(64, 256),
            block1_pw2: pointwise(256, 64),

            downsample: Conv2dConfig::new([64, FEATURE_CHANNELS], [2, 2])
                .with_stride([2, 2])
                .init(device),
            downsample_norm: norm(FEATURE_CHANNELS),

            block2_depthwise: depthwise7(FEATURE_CHANNELS),
            block2_norm: norm(FEATURE_CHANNELS),
            block2_pw1: pointwise(FEATURE_CHANNELS, FEATURE_CHANNELS * 4),
            block2_pw2: pointwise(FEATURE_CHANNELS * 4, FEATURE_CHANNELS),

            branch_drop: DropoutConfig::new(drop_path_rate).init(),
            activation: Gelu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem_norm.forward(self.stem.forward(input));

        let y = self.block1_norm.forward(self.block1_depthwise.forward(x.clone()));
        let y = self.activation.forward(self.block1_pw1.forward(y));
        let y = self.block1_pw2.forward(y);
        let x = x.add(self.branch_drop.forward(y));

        let x = self.downsample_norm.forward(self.downsample.forward(x));

        let y = self.block2_norm.forward(self.block2_depthwise.forward(x.clone()));
        let y = self.activation.forward(self.block2_pw1.forward(y));
        let y = self.block2_pw2.forward(y);
        x.add(self.branch_drop.forward(y))
    }
}
