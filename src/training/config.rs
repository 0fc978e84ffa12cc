use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    // Dataset
    pub data_dir: String,
    pub img_size: usize,

    // Training
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,

    // Outputs
    pub save_dir: String,
    pub plot_path: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: "dataset_split".to_string(),
            img_size: crate::IMG_SIZE,
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-4,
            save_dir: "runs/train".to_string(),
            plot_path: "training_history.png".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn from_yaml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrainingConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");

        let config = TrainingConfig {
            epochs: 3,
            learning_rate: 0.01,
            ..Default::default()
        };
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = TrainingConfig::from_yaml(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.learning_rate, 0.01);
        assert_eq!(loaded.img_size, crate::IMG_SIZE);
    }
}
