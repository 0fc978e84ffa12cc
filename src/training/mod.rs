pub mod config;
pub mod history;
pub mod trainer;

pub use config::TrainingConfig;
pub use history::TrainingHistory;
pub use trainer::Trainer;
