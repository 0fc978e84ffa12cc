use clap::Parser;
use std::path::PathBuf;

use tb_detection::server::{build_state, router, ModelStatus};

const DEFAULT_MODEL_URL: &str =
    "https://drive.google.com/uc?export=download&id=1ljpK2LvQVn4hX6Z2x7Hd9rOXi9keAgqj";

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the TB detection model over HTTP")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Local weight file; downloaded from --model-url when absent
    #[arg(short, long, default_value = "models/tb_model.bin")]
    weights: PathBuf,

    #[arg(long, default_value = DEFAULT_MODEL_URL)]
    model_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    let args = Args::parse();

    println!("Starting TB Detection API server...");

    let state = build_state(&args.weights, &args.model_url).await;
    if state.status == ModelStatus::Degraded {
        println!("⚠️  Serving with untrained fallback weights; predictions are meaningless");
    }

    let app = router(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("Listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
