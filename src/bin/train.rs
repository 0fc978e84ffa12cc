use burn::backend::{Autodiff, NdArray};
use std::path::Path;

use tb_detection::data::XrayDataset;
use tb_detection::training::{Trainer, TrainingConfig};

const CONFIG_PATH: &str = "configs/train_config.yaml";

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("🚀 TB Detection Training (CPU)");
    println!("==============================\n");

    type MyBackend = NdArray;
    type MyAutodiffBackend = Autodiff<MyBackend>;
    let device = Default::default();

    let config = if Path::new(CONFIG_PATH).exists() {
        println!("Loading config from {CONFIG_PATH}");
        TrainingConfig::from_yaml(CONFIG_PATH)?
    } else {
        let config = TrainingConfig::default();
        std::fs::create_dir_all("configs")?;
        config.save(CONFIG_PATH)?;
        println!("Created default config at {CONFIG_PATH}");
        config
    };

    println!("\nTraining Configuration:");
    println!("  Data dir: {}", config.data_dir);
    println!("  Epochs: {}", config.epochs);
    println!("  Batch size: {}", config.batch_size);
    println!("  Learning rate: {}", config.learning_rate);
    println!("  Image size: {}x{}", config.img_size, config.img_size);
    println!("  Save dir: {}", config.save_dir);
    println!();

    let mut trainer = Trainer::<MyAutodiffBackend>::new(config.clone(), device);
    let history = trainer.train()?;

    // Final accuracy on the untouched test split.
    let test_dataset = XrayDataset::from_split_dir(&Path::new(&config.data_dir).join("Test"))?;
    let (test_loss, test_acc) = trainer.evaluate(&test_dataset);
    println!("\n🎯 Test Accuracy: {test_acc:.4} (loss {test_loss:.4})");

    history.plot(Path::new(&config.plot_path))?;
    println!("📊 Training history plot saved as {}", config.plot_path);

    Ok(())
}
