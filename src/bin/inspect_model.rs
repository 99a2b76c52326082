use anyhow::Result;
use rusty_hands::classifier::{ModelClassifier, ModelKind};
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: inspect_model <onnx|forest> <path_to_model>");
        return Ok(());
    }

    let kind: ModelKind = args[1].parse()?;
    let model_path = &args[2];
    println!("Inspecting {} model: {}", kind, model_path);

    let model = ModelClassifier::load(kind, model_path)?;
    println!("{}", model.describe());

    Ok(())
}
