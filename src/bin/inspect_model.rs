use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing::error;

use gaze_pointer::error::exit_status;
use gaze_pointer::inference::{Device, OnnxModel};
use gaze_pointer::logging;

/// Print the tensor layout of ONNX models, optionally binding them to a device
#[derive(Parser, Debug)]
#[command(name = "inspect_model", author, version, about, long_about = None)]
struct Cli {
    #[arg(required = true)]
    models: Vec<PathBuf>,

    /// Also try to load each model on this device
    #[arg(short, long, value_enum)]
    device: Option<Device>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    for path in &cli.models {
        if let Err(e) = inspect(path, cli.device) {
            error!("{e:#}");
            return ExitCode::from(exit_status(&e));
        }
    }
    ExitCode::SUCCESS
}

fn inspect(path: &Path, device: Option<Device>) -> Result<()> {
    let mut model = OnnxModel::new(path, device.unwrap_or_default(), 1)?;
    println!("{}", format!("Model: {}", path.display()).bold());

    println!("--- Inputs ---");
    for (i, input) in model.inputs().iter().enumerate() {
        match input.spatial() {
            Some((w, h)) => println!("#{}: {} {:?} (image {}x{})", i, input.name, input.shape, w, h),
            None => println!("#{}: {} {:?}", i, input.name, input.shape),
        }
    }

    println!("--- Outputs ---");
    for (i, output) in model.outputs().iter().enumerate() {
        println!("#{}: {}", i, output);
    }

    if device.is_some() {
        model.load_model()?;
        println!("{}", format!("Loaded on {}", model.device()).green());
    }
    println!();
    Ok(())
}
