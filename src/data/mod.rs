pub mod dataloader;
pub mod dataset;
pub mod split;

pub use dataloader::{XrayBatch, XrayLoader};
pub use dataset::XrayDataset;
pub use split::{split_dataset, ClassCounts, SplitConfig, SplitSummary, SPLIT_NAMES};
