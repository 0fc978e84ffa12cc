use burn::prelude::*;
use rand::seq::SliceRandom;

use super::dataset::XrayDataset;

/// Batching iterator over an [`XrayDataset`].
///
/// Each image is resized to `img_size`, converted to RGB and normalized to
/// [0,1] in NCHW layout. Unreadable files are skipped with a warning.
pub struct XrayLoader<B: Backend> {
    dataset: XrayDataset,
    img_size: usize,
    batch_size: usize,
    shuffle: bool,
    device: B::Device,
    indices: Vec<usize>,
    current_idx: usize,
}

pub struct XrayBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
    pub labels: Vec<usize>,
    pub batch_size: usize,
}

impl<B: Backend> XrayLoader<B> {
    pub fn new(
        dataset: XrayDataset,
        img_size: usize,
        batch_size: usize,
        shuffle: bool,
        device: B::Device,
    ) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();

        if shuffle {
            let mut rng = rand::thread_rng();
            indices.shuffle(&mut rng);
        }

        Self {
            dataset,
            img_size,
            batch_size,
            shuffle,
            device,
            indices,
            current_idx: 0,
        }
    }

    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            let mut rng = rand::thread_rng();
            self.indices.shuffle(&mut rng);
        }
    }

    pub fn len(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

impl<B: Backend> Iterator for XrayLoader<B> {
    type Item = XrayBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_idx < self.dataset.len() {
            let end_idx = (self.current_idx + self.batch_size).min(self.dataset.len());
            let batch_indices = &self.indices[self.current_idx..end_idx];
            self.current_idx = end_idx;

            let mut images_vec = Vec::new();
            let mut labels = Vec::new();

            for &idx in batch_indices {
                let (img, label) = match self.dataset.get(idx) {
                    Ok(sample) => sample,
                    Err(e) => {
                        log::warn!("skipping unreadable sample {idx}: {e}");
                        continue;
                    }
                };

                let img = img.resize_exact(
                    self.img_size as u32,
                    self.img_size as u32,
                    image::imageops::FilterType::Lanczos3,
                );
                let rgb = img.to_rgb8();

                for c in 0..3 {
                    for y in 0..self.img_size {
                        for x in 0..self.img_size {
                            let pixel = rgb.get_pixel(x as u32, y as u32);
                            images_vec.push(pixel[c] as f32 / 255.0);
                        }
                    }
                }
                labels.push(label);
            }

            if labels.is_empty() {
                continue;
            }
            let batch_size = labels.len();

            let images = Tensor::<B, 1>::from_floats(images_vec.as_slice(), &self.device)
                .reshape([batch_size, 3, self.img_size, self.img_size]);

            let targets_data: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
            let targets = Tensor::<B, 1, Int>::from_data(
                TensorData::new(targets_data, [batch_size]),
                &self.device,
            );

            return Some(XrayBatch {
                images,
                targets,
                labels,
                batch_size,
            });
        }

        None
    }
}
