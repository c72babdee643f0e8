use std::path::PathBuf;

use clap::Parser;

use crate::feeder::InputType;
use crate::inference::Device;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input source
    #[arg(short = 't', long, value_enum)]
    pub input_type: InputType,

    /// Image or video file (not used for cam)
    #[arg(short, long, required_if_eq_any([("input_type", "image"), ("input_type", "video")]))]
    pub input: Option<PathBuf>,

    /// Show the annotated frames in a window
    #[arg(short, long, default_value_t = false)]
    pub show: bool,

    /// Device the networks run on
    #[arg(short, long, value_enum, default_value_t = Device::Cpu)]
    pub device: Device,

    /// Camera index for cam input
    #[arg(long, default_value_t = 0)]
    pub cam_index: usize,

    /// Configuration file, created with defaults if missing
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Log pointer moves instead of performing them
    #[arg(long, default_value_t = false)]
    pub no_pointer: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Per-stage timing run over a fixed input
#[derive(Parser, Debug)]
#[command(name = "benchmark", author, version, about, long_about = None)]
pub struct BenchmarkArgs {
    #[arg(short, long, default_value = "media/demo.mp4")]
    pub input: PathBuf,

    #[arg(short = 't', long, value_enum, default_value_t = InputType::Video)]
    pub input_type: InputType,

    #[arg(short, long, value_enum, default_value_t = Device::Cpu)]
    pub device: Device,

    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
