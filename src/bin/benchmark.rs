use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::{error, info};

use gaze_pointer::args::BenchmarkArgs;
use gaze_pointer::benchmark::{self, BenchmarkReport};
use gaze_pointer::config::AppConfig;
use gaze_pointer::error::exit_status;
use gaze_pointer::feeder::InputFeeder;
use gaze_pointer::logging;
use gaze_pointer::pipeline::GazePipeline;

fn main() -> ExitCode {
    let args = BenchmarkArgs::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(report) => {
            println!("{}", format!("Benchmark on {}", args.device).bold());
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn run(args: &BenchmarkArgs) -> Result<BenchmarkReport> {
    let config = AppConfig::load(&args.config)?;
    let mut pipeline = GazePipeline::from_config(&config, args.device)?;

    let mut feed = InputFeeder::new(args.input_type, Some(&args.input), 0)?;
    feed.load_data()
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let frames = benchmark::run(&mut pipeline, feed.next_batch())?;
    feed.close();
    info!("Benchmark finished after {} frames", frames);

    Ok(BenchmarkReport::new(
        frames,
        pipeline.timings(),
        config.models.precisions(),
    ))
}
