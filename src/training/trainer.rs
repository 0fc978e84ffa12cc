use crate::data::{XrayDataset, XrayLoader};
use crate::model::TbNet;
use crate::training::{TrainingConfig, TrainingHistory};
use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct Trainer<B: AutodiffBackend> {
    pub model: TbNet<B>,
    config: TrainingConfig,
    device: B::Device,
    optimizer: OptimizerAdaptor<Adam, TbNet<B>, B>,
    history: TrainingHistory,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        let model = TbNet::new(&device);
        let optimizer = AdamConfig::new().init();

        Self {
            model,
            config,
            device,
            optimizer,
            history: TrainingHistory::default(),
        }
    }

    /// Fit against the Train split, validating each epoch against the
    /// Validation split. Saves a `best` checkpoint whenever validation loss
    /// improves and a `final` checkpoint when done.
    pub fn train(&mut self) -> Result<TrainingHistory> {
        let data_dir = PathBuf::from(&self.config.data_dir);
        let train_dataset = XrayDataset::from_split_dir(&data_dir.join("Train"))?;
        let val_dataset = XrayDataset::from_split_dir(&data_dir.join("Validation"))?;

        println!("Dataset loaded:");
        println!("  Train: {} images {:?}", train_dataset.len(), train_dataset.class_counts());
        println!("  Val:   {} images {:?}", val_dataset.len(), val_dataset.class_counts());
        println!();

        std::fs::create_dir_all(&self.config.save_dir)?;

        let pb = ProgressBar::new(self.config.epochs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap(),
        );

        let mut best_val_loss = f32::INFINITY;

        for epoch in 1..=self.config.epochs {
            let epoch_start = Instant::now();

            let (train_loss, train_acc) = self.train_epoch(&train_dataset);
            let (val_loss, val_acc) = self.evaluate(&val_dataset);

            self.history.push(train_loss, train_acc, val_loss, val_acc);

            pb.set_message(format!(
                "Epoch {epoch}: loss={train_loss:.4} acc={train_acc:.3} val_loss={val_loss:.4} val_acc={val_acc:.3}"
            ));
            pb.inc(1);

            if val_loss.is_finite() && val_loss < best_val_loss {
                println!("Validation loss improved, saving best checkpoint...");
                self.save_checkpoint("best")?;
                best_val_loss = val_loss;
            }

            println!("Epoch time: {:.2}s", epoch_start.elapsed().as_secs_f32());
        }

        self.save_checkpoint("final")?;
        pb.finish_with_message("Training completed!");
        println!("Checkpoints saved in: {}", self.config.save_dir);

        Ok(self.history.clone())
    }

    fn train_epoch(&mut self, dataset: &XrayDataset) -> (f32, f32) {
        let loader: XrayLoader<B> = XrayLoader::new(
            dataset.clone(),
            self.config.img_size,
            self.config.batch_size,
            true,
            self.device.clone(),
        );
        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&self.device);

        let mut total_loss = 0.0;
        let mut correct = 0usize;
        let mut seen = 0usize;
        let mut count = 0usize;

        for (batch_idx, batch) in loader.enumerate() {
            let logits: Tensor<B, 1> = self
                .model
                .forward(batch.images.clone())
                .reshape([batch.batch_size]);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let loss_value = loss.clone().into_scalar().elem::<f32>();
            if loss_value.is_nan() || loss_value.is_infinite() {
                log::warn!("NaN/Inf loss at batch {}, skipping", batch_idx + 1);
                continue;
            }

            total_loss += loss_value;
            count += 1;

            let probs: Vec<f32> = sigmoid(logits)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .unwrap_or_default();
            correct += count_correct(&probs, &batch.labels);
            seen += batch.batch_size;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.config.learning_rate, self.model.clone(), grads);
        }

        let avg_loss = if count > 0 { total_loss / count as f32 } else { 0.0 };
        let accuracy = if seen > 0 { correct as f32 / seen as f32 } else { 0.0 };
        (avg_loss, accuracy)
    }

    /// Loss and accuracy over a split, without gradients or dropout.
    pub fn evaluate(&self, dataset: &XrayDataset) -> (f32, f32) {
        let inner_device = <B::InnerBackend as burn::tensor::backend::BackendTypes>::Device::default();
        let loader: XrayLoader<B::InnerBackend> = XrayLoader::new(
            dataset.clone(),
            self.config.img_size,
            self.config.batch_size,
            false,
            inner_device.clone(),
        );
        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&inner_device);
        let model = self.model.valid();

        let mut total_loss = 0.0;
        let mut correct = 0usize;
        let mut seen = 0usize;
        let mut count = 0usize;

        for batch in loader {
            let logits: Tensor<B::InnerBackend, 1> =
                model.forward(batch.images.clone()).reshape([batch.batch_size]);
            let loss_value = loss_fn
                .forward(logits.clone(), batch.targets.clone())
                .into_scalar()
                .elem::<f32>();

            if loss_value.is_nan() {
                log::warn!("NaN in validation batch, skipping");
                continue;
            }

            total_loss += loss_value;
            count += 1;

            let probs: Vec<f32> = sigmoid(logits)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .unwrap_or_default();
            correct += count_correct(&probs, &batch.labels);
            seen += batch.batch_size;
        }

        let avg_loss = if count > 0 { total_loss / count as f32 } else { 0.0 };
        let accuracy = if seen > 0 { correct as f32 / seen as f32 } else { 0.0 };
        (avg_loss, accuracy)
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Serialize the model (architecture is implied by the record) under
    /// `save_dir/<name>/model.bin`, with the training config alongside.
    fn save_checkpoint(&self, name: &str) -> Result<()> {
        let checkpoint_dir = Path::new(&self.config.save_dir).join(name);
        std::fs::create_dir_all(&checkpoint_dir)?;

        let record = self.model.clone().into_record();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(record, checkpoint_dir.join("model"))
            .with_context(|| format!("saving checkpoint {name}"))?;

        self.config
            .save(checkpoint_dir.join("config.yaml").to_string_lossy().as_ref())?;

        Ok(())
    }
}

fn count_correct(probs: &[f32], labels: &[usize]) -> usize {
    probs
        .iter()
        .zip(labels)
        .filter(|&(&p, &label)| (p >= 0.5) == (label == 1))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_correct_applies_threshold() {
        let probs = [0.9, 0.4, 0.5, 0.1];
        let labels = [1, 0, 1, 1];
        // 0.9→1 ok, 0.4→0 ok, 0.5→1 ok, 0.1→0 wrong.
        assert_eq!(count_correct(&probs, &labels), 3);
    }
}
