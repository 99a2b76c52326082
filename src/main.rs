use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rusty_hands::args::Args;
use rusty_hands::classifier::{select_classifier, GestureClassifier};
use rusty_hands::config::AppConfig;
use rusty_hands::landmarker::build_landmarker;
use rusty_hands::pipeline::FramePipeline;
use rusty_hands::streaming::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG overrides the default level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _tracing = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .try_init();

    // 0. Load Config
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    if args.write_config {
        config.save(&args.config)?;
        tracing::info!("Wrote configuration to {}", args.config);
    }

    // 1. Classifier (fixed for the process lifetime)
    let classifier = select_classifier(&config.classifier);
    tracing::info!("Active classifier: {}", classifier.name());

    // 2. Landmark extraction
    let landmarker = build_landmarker(&config.landmarker)?;

    let pipeline = FramePipeline::new(landmarker, classifier);
    tracing::info!("Active landmarker: {}", pipeline.landmarker_name());

    // 3. Serve
    let state = AppState::new(pipeline, config.session.frame_timeout());
    streaming::serve(&config.bind_addr(), state).await
}
