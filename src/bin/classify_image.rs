use anyhow::Context;
use image::ImageReader;
use rusty_hands::classifier::select_classifier;
use rusty_hands::config::AppConfig;
use rusty_hands::landmarker::build_landmarker;
use rusty_hands::pipeline::FramePipeline;
use std::env;

/// Runs one still image through the same pipeline the server uses.
fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = args.remove(i + 1);
            args.remove(i);
            path
        }
        _ => AppConfig::DEFAULT_PATH.to_string(),
    };
    let Some(img_path) = args.first() else {
        println!("Usage: classify_image [--config config.json] <image>");
        return Ok(());
    };

    let config = AppConfig::load(&config_path)?;
    let pipeline = FramePipeline::new(
        build_landmarker(&config.landmarker)?,
        select_classifier(&config.classifier),
    );
    println!("Classifier: {}", pipeline.classifier_name());
    println!("Landmarker: {}", pipeline.landmarker_name());

    println!("Loading {:?}", img_path);
    let img = ImageReader::open(img_path)?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decoding {img_path}"))?
        .to_rgb8();

    let response = pipeline.process_image(&img)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
