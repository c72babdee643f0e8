use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use gaze_pointer::args::Args;
use gaze_pointer::config::AppConfig;
use gaze_pointer::error::exit_status;
use gaze_pointer::feeder::InputFeeder;
use gaze_pointer::pipeline::GazePipeline;
use gaze_pointer::pointer::{self, MouseController};
use gaze_pointer::{logging, output};

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = AppConfig::load(&args.config)?;

    let mut pipeline = GazePipeline::from_config(&config, args.device)?;
    for (stage, name) in pipeline.stage_names().iter().enumerate() {
        debug!("Stage {}: {}", stage + 1, name);
    }

    let mut feed = InputFeeder::new(args.input_type, args.input.as_deref(), args.cam_index)?;
    feed.load_data().context("Failed to open input")?;

    let backend = pointer::default_backend(args.no_pointer, config.pointer.dry_run_screen)?;
    let mut mouse = MouseController::new(backend, config.pointer.precision, config.pointer.speed);
    let (sw, sh) = mouse.get_screen_size()?;
    info!("Screen {}x{}", sw, sh);
    mouse.move_to_center()?;

    #[cfg(feature = "display")]
    let mut window = match (args.show, feed.input_shape()) {
        (true, Some((w, h))) => Some(output::WindowOutput::new("gaze-pointer", w as usize, h as usize)?),
        _ => None,
    };
    #[cfg(not(feature = "display"))]
    {
        if args.show {
            tracing::warn!("Built without the `display` feature, --show is ignored");
        }
    }

    let mut frames = 0usize;
    for frame in feed.next_batch() {
        let mut frame = frame?;
        frames += 1;

        let result = pipeline.process(&frame)?;
        if let Some(result) = &result {
            debug!(
                "Frame {}: head pose {:?}, gaze ({:.3}, {:.3}, {:.3})",
                frames, result.head_pose, result.gaze.x, result.gaze.y, result.gaze.z
            );
            if args.show {
                output::draw_result(&mut frame, result, config.display.gaze_arrow_length);
            }
        }

        #[cfg(feature = "display")]
        {
            if let Some(window) = window.as_mut() {
                if !window.is_open() {
                    info!("Window closed, stopping");
                    break;
                }
                window.show(&frame)?;
            }
        }

        if let Some(result) = result {
            mouse.move_by_gaze(result.gaze.x, result.gaze.y, config.pointer.invert_x)?;
        }
    }

    info!("Input exhausted after {} frames", frames);
    feed.close();
    Ok(())
}
