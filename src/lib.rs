pub mod data;
pub mod error;
pub mod model;
pub mod predictor;
pub mod server;
pub mod training;

// Re-exports for convenience
pub use data::{SplitConfig, SplitSummary, XrayBatch, XrayDataset, XrayLoader};
pub use error::PredictError;
pub use model::{Heatmap, TbNet};
pub use predictor::{Label, Prediction, TbPredictor};
pub use training::{Trainer, TrainingConfig, TrainingHistory};

/// Model input side length. Images are resized to this before inference.
pub const IMG_SIZE: usize = 224;

/// Class names, index-aligned with the sigmoid threshold rule:
/// probability < 0.5 → index 0, probability ≥ 0.5 → index 1.
pub const CLASS_NAMES: [&str; 2] = ["Normal", "Tuberculosis"];
