pub mod cnn;
pub mod gradcam;

pub use cnn::{TbNet, FEATURE_CHANNELS, FEATURE_SIZE};
pub use gradcam::Heatmap;
