use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use std::path::PathBuf;

use tb_detection::predictor::TbPredictor;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify a chest X-ray image")]
struct Args {
    /// Path to input image
    #[arg(short, long)]
    image: PathBuf,

    /// Path to model weights
    #[arg(short, long, default_value = "runs/train/final/model.bin")]
    weights: PathBuf,

    /// Write a Grad-CAM overlay PNG for the predicted class here
    #[arg(long)]
    heatmap: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    type MyBackend = Autodiff<NdArray>;
    let device = Default::default();

    let predictor = TbPredictor::<MyBackend>::from_file(&args.weights, &device)?;

    let bytes = std::fs::read(&args.image)?;
    let prediction = predictor.predict(&bytes)?;

    println!(
        "{}: {} ({:.1}% confidence)",
        args.image.display(),
        prediction.label,
        prediction.confidence * 100.0
    );

    if let Some(out) = args.heatmap {
        let img = image::load_from_memory(&bytes)?;
        let input = predictor.preprocess_image(&img);
        let heatmap = predictor.gradcam(input, prediction.label.index());
        let overlay = heatmap.overlay_on(&img.to_rgb8(), 0.4);

        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        overlay.save(&out)?;
        println!("Heatmap overlay saved to {}", out.display());
    }

    Ok(())
}
