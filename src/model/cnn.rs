use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use crate::IMG_SIZE;

/// Spatial side of the last conv layer's activations for a 224x224 input:
/// 224 -> 222 -> 111 -> 109 -> 54 -> 52 (three valid 3x3 convs, two 2x2 pools).
pub const FEATURE_SIZE: usize = 52;

/// Channels of the last conv layer.
pub const FEATURE_CHANNELS: usize = 128;

const HIDDEN_SIZE: usize = 128;
const DROPOUT: f64 = 0.5;

/// Binary chest X-ray classifier.
///
/// Three conv+pool blocks of increasing filter count (32/64/128), a dense
/// hidden layer with dropout, and a single output unit. `forward` returns the
/// raw logit; apply sigmoid for the Tuberculosis probability.
#[derive(Module, Debug)]
pub struct TbNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> TbNet<B> {
    pub fn new(device: &B::Device) -> Self {
        // Valid padding throughout, matching the fixed input/output contract.
        let flat = FEATURE_CHANNELS * (FEATURE_SIZE / 2) * (FEATURE_SIZE / 2);

        Self {
            conv1: Conv2dConfig::new([3, 32], [3, 3]).init(device),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            conv3: Conv2dConfig::new([64, FEATURE_CHANNELS], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(flat, HIDDEN_SIZE).init(device),
            fc2: LinearConfig::new(HIDDEN_SIZE, 1).init(device),
            dropout: DropoutConfig::new(DROPOUT).init(),
        }
    }

    /// Full forward pass. Input [batch, 3, 224, 224], output logits [batch, 1].
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_head(self.forward_features(x))
    }

    /// Conv stack up to and including the last conv activation,
    /// [batch, 128, 52, 52]. This is the tensor Grad-CAM attributes against.
    pub fn forward_features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.pool.forward(activation::relu(self.conv1.forward(x)));
        let x = self.pool.forward(activation::relu(self.conv2.forward(x)));
        activation::relu(self.conv3.forward(x))
    }

    /// Remainder of the network after `forward_features`.
    pub fn forward_head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(features);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = activation::relu(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Same as `forward_head` but never applies dropout. Grad-CAM runs on the
    /// autodiff backend, where `Dropout` would otherwise be active.
    pub fn forward_head_inference(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(features);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = activation::relu(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Expected input dimensions for a single image, without batch dimension.
    pub fn input_dims() -> [usize; 3] {
        [3, IMG_SIZE, IMG_SIZE]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn forward_shape() {
        let device = Default::default();
        let model = TbNet::<TestBackend>::new(&device);

        let x = Tensor::<TestBackend, 4>::zeros([2, 3, IMG_SIZE, IMG_SIZE], &device);
        let out = model.forward(x);
        assert_eq!(out.dims(), [2, 1]);
    }

    #[test]
    fn feature_shape() {
        let device = Default::default();
        let model = TbNet::<TestBackend>::new(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, IMG_SIZE, IMG_SIZE], &device);
        let features = model.forward_features(x);
        assert_eq!(features.dims(), [1, FEATURE_CHANNELS, FEATURE_SIZE, FEATURE_SIZE]);
    }

    #[test]
    fn head_completes_the_pass() {
        let device = Default::default();
        let model = TbNet::<TestBackend>::new(&device);

        let features =
            Tensor::<TestBackend, 4>::zeros([1, FEATURE_CHANNELS, FEATURE_SIZE, FEATURE_SIZE], &device);
        let out = model.forward_head(features);
        assert_eq!(out.dims(), [1, 1]);
    }
}
