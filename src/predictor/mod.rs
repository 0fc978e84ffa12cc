use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;

use crate::error::PredictError;
use crate::model::{Heatmap, TbNet};
use crate::{CLASS_NAMES, IMG_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Normal,
    Tuberculosis,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        CLASS_NAMES[self as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: Label,
    /// Certainty in the chosen label: p for Tuberculosis, 1 − p for Normal.
    /// Always in [0.5, 1] by the thresholding rule.
    pub confidence: f32,
    /// Raw sigmoid output (probability of Tuberculosis).
    #[serde(skip)]
    pub probability: f32,
}

/// Loads the trained network once and answers predictions from raw image
/// bytes. Read-only after construction; the forward pass runs on the
/// non-autodiff inner backend and is safe to share across requests.
#[derive(Debug)]
pub struct TbPredictor<B: AutodiffBackend> {
    model: TbNet<B>,
    device: B::Device,
}

impl<B: AutodiffBackend> TbPredictor<B> {
    /// Load persisted weights. The file must contain a record of the same
    /// fixed architecture the trainer saves.
    pub fn from_file(path: &Path, device: &B::Device) -> Result<Self, PredictError> {
        if !path.is_file() {
            return Err(PredictError::ArtifactMissing {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.to_path_buf(), device)
            .map_err(|e| PredictError::ArtifactMissing {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            model: TbNet::new(device).load_record(record),
            device: device.clone(),
        })
    }

    /// Fresh, untrained weights with the same architecture. A resilience
    /// fallback so a service can keep answering; predictions from it are
    /// meaningless.
    pub fn untrained(device: &B::Device) -> Self {
        Self {
            model: TbNet::new(device),
            device: device.clone(),
        }
    }

    pub fn input_size() -> [usize; 2] {
        [IMG_SIZE, IMG_SIZE]
    }

    /// Decode image bytes into the model's input tensor:
    /// RGB, 224×224, [0,1], leading batch dimension of 1.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor<B, 4>, PredictError> {
        let img = image::load_from_memory(bytes)?;
        Ok(self.preprocess_image(&img))
    }

    pub fn preprocess_image(&self, img: &DynamicImage) -> Tensor<B, 4> {
        let resized = img.resize_exact(
            IMG_SIZE as u32,
            IMG_SIZE as u32,
            image::imageops::FilterType::Lanczos3,
        );
        let rgb = resized.to_rgb8();

        let mut values = Vec::with_capacity(3 * IMG_SIZE * IMG_SIZE);
        for c in 0..3 {
            for y in 0..IMG_SIZE {
                for x in 0..IMG_SIZE {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    values.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        Tensor::<B, 1>::from_floats(values.as_slice(), &self.device)
            .reshape([1, 3, IMG_SIZE, IMG_SIZE])
    }

    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, PredictError> {
        let input = self.preprocess(bytes)?;
        self.predict_tensor(input)
    }

    /// Forward pass and thresholding on an already-preprocessed tensor.
    pub fn predict_tensor(&self, input: Tensor<B, 4>) -> Result<Prediction, PredictError> {
        let dims = input.dims();
        let expected = [1, 3, IMG_SIZE, IMG_SIZE];
        if dims != expected {
            return Err(PredictError::ShapeMismatch {
                expected: expected.to_vec(),
                got: dims.to_vec(),
            });
        }

        let logit = self.model.valid().forward(input.inner());
        let probability = sigmoid(logit).into_scalar().elem::<f32>();

        if !probability.is_finite() {
            return Err(PredictError::InferenceFailure(format!(
                "non-finite model output: {probability}"
            )));
        }

        let (label, confidence) = if probability >= 0.5 {
            (Label::Tuberculosis, probability)
        } else {
            (Label::Normal, 1.0 - probability)
        };

        Ok(Prediction {
            label,
            confidence,
            probability,
        })
    }

    /// Grad-CAM heatmap for the given class on a preprocessed input.
    pub fn gradcam(&self, input: Tensor<B, 4>, class_index: usize) -> Heatmap {
        self.model.gradcam(input, class_index)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}
