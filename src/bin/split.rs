use clap::Parser;
use std::path::PathBuf;

use tb_detection::data::{split_dataset, SplitConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Split class folders into Train/Validation/Test")]
struct Args {
    /// Directory containing the Normal/ and Tuberculosis/ folders
    #[arg(short, long, default_value = "data")]
    input: PathBuf,

    /// Output directory for the split dataset
    #[arg(short, long, default_value = "dataset_split")]
    output: PathBuf,

    #[arg(long, default_value_t = 0.70)]
    train_ratio: f64,

    #[arg(long, default_value_t = 0.15)]
    val_ratio: f64,

    #[arg(long, default_value_t = 0.15)]
    test_ratio: f64,

    /// Shuffle seed; the same seed reproduces the same split
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = SplitConfig {
        train_ratio: args.train_ratio,
        val_ratio: args.val_ratio,
        test_ratio: args.test_ratio,
        seed: args.seed,
    };

    println!("Splitting {} into {}", args.input.display(), args.output.display());
    println!(
        "Ratios: {:.2}/{:.2}/{:.2}, seed {}",
        config.train_ratio, config.val_ratio, config.test_ratio, config.seed
    );
    println!();

    let summary = split_dataset(&args.input, &args.output, &config)?;

    for counts in &summary.per_class {
        println!(
            "  {}: {} train, {} val, {} test",
            counts.class, counts.train, counts.val, counts.test
        );
    }
    println!();
    println!("✅ Dataset successfully split into Train, Validation, and Test!");

    Ok(())
}
