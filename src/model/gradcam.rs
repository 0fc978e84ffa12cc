use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::backend::AutodiffBackend;
use image::{GrayImage, RgbImage};
use rand::Rng;

use super::cnn::{TbNet, FEATURE_SIZE};

/// Coarse class-activation map, row-major, values in [0,1].
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl<B: AutodiffBackend> TbNet<B> {
    /// Grad-CAM for the given class (0 = Normal, 1 = Tuberculosis).
    ///
    /// Backprops the class score through the head to the last conv
    /// activations, pools the gradients into per-channel weights, and takes
    /// the clamped, normalized weighted channel sum. The result lives at the
    /// conv layer's spatial resolution; resize before overlaying.
    ///
    /// Falls back to a random heatmap when no gradient is available.
    pub fn gradcam(&self, input: Tensor<B, 4>, class_index: usize) -> Heatmap {
        let features = self.forward_features(input).detach().require_grad();

        // Inference-time head: no dropout between the dense layers.
        let logit = self.forward_head_inference(features.clone());
        let prob = activation::sigmoid(logit);
        let score = if class_index == 1 {
            prob
        } else {
            prob.neg().add_scalar(1.0)
        };

        let grads = score.sum().backward();
        let grad = match features.grad(&grads) {
            Some(grad) => grad,
            None => return Heatmap::random(FEATURE_SIZE, FEATURE_SIZE),
        };

        // Per-channel importance: spatial mean of the gradients.
        let weights = grad.mean_dim(3).mean_dim(2); // [1, C, 1, 1]
        let cam = (features.inner() * weights).sum_dim(1).clamp_min(0.0); // [1, 1, H, W]

        let [_, _, height, width] = cam.dims();
        let max = cam.clone().max().into_scalar().elem::<f32>();
        let values: Vec<f32> = match cam.into_data().convert::<f32>().to_vec() {
            Ok(values) => values,
            Err(_) => return Heatmap::random(width, height),
        };

        let denom = max.max(1e-8);
        Heatmap {
            width,
            height,
            values: values.into_iter().map(|v| v / denom).collect(),
        }
    }
}

impl Heatmap {
    pub fn random(width: usize, height: usize) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            width,
            height,
            values: (0..width * height).map(|_| rng.gen_range(0.0..1.0)).collect(),
        }
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Bilinear resize to the target resolution, as an 8-bit gray image.
    pub fn resized(&self, width: u32, height: u32) -> GrayImage {
        let gray = GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Luma([(self.get(x as usize, y as usize) * 255.0) as u8])
        });
        image::imageops::resize(&gray, width, height, image::imageops::FilterType::Triangle)
    }

    /// Blend a jet-colored rendering of the map over the base image.
    pub fn overlay_on(&self, base: &RgbImage, alpha: f32) -> RgbImage {
        let (width, height) = base.dimensions();
        let resized = self.resized(width, height);
        let alpha = alpha.clamp(0.0, 1.0);

        RgbImage::from_fn(width, height, |x, y| {
            let v = resized.get_pixel(x, y)[0] as f32 / 255.0;
            let heat = jet(v);
            let src = base.get_pixel(x, y);
            let mut out = [0u8; 3];
            for c in 0..3 {
                out[c] = (src[c] as f32 * (1.0 - alpha) + heat[c] as f32 * alpha) as u8;
            }
            image::Rgb(out)
        })
    }
}

/// Jet-style colormap: blue → cyan → yellow → red.
fn jet(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0) * 4.0;
    let (r, g, b) = if v < 1.0 {
        (0.0, v, 1.0)
    } else if v < 2.0 {
        (0.0, 1.0, 2.0 - v)
    } else if v < 3.0 {
        (v - 2.0, 1.0, 0.0)
    } else {
        (1.0, 4.0 - v, 0.0)
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}
