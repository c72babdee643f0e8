//! Per-stage load and inference timing, and the throughput report built from it.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::pipeline::GazePipeline;
use crate::types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FaceDetection,
    LandmarkDetection,
    HeadPose,
    Gaze,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::FaceDetection,
        Stage::LandmarkDetection,
        Stage::HeadPose,
        Stage::Gaze,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::FaceDetection => "Face Detection",
            Stage::LandmarkDetection => "Face Landmarks Detection",
            Stage::HeadPose => "Head Pose Estimation",
            Stage::Gaze => "Gaze Estimation",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Load time (once per model) and summed inference time per stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    load: [Duration; 4],
    inference: [Duration; 4],
    calls: [u64; 4],
}

impl StageTimings {
    pub fn set_load(&mut self, stage: Stage, elapsed: Duration) {
        self.load[stage.index()] = elapsed;
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.inference[stage.index()] += elapsed;
        self.calls[stage.index()] += 1;
    }

    pub fn load(&self, stage: Stage) -> Duration {
        self.load[stage.index()]
    }

    pub fn inference(&self, stage: Stage) -> Duration {
        self.inference[stage.index()]
    }

    pub fn calls(&self, stage: Stage) -> u64 {
        self.calls[stage.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub precision: String,
    pub load: Duration,
    pub total: Duration,
    pub fps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub frames: usize,
    pub stages: Vec<StageReport>,
}

impl BenchmarkReport {
    /// `precisions` is indexed like `Stage::ALL`
    pub fn new(frames: usize, timings: &StageTimings, precisions: [&str; 4]) -> Self {
        let stages = Stage::ALL
            .iter()
            .zip(precisions)
            .map(|(&stage, precision)| {
                let total = timings.inference(stage);
                StageReport {
                    stage,
                    precision: precision.to_string(),
                    load: timings.load(stage),
                    total,
                    fps: frames_per_second(frames, total),
                }
            })
            .collect();
        Self { frames, stages }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Frames divided by total inference seconds; 0.0 when nothing was timed
pub fn frames_per_second(frames: usize, total: Duration) -> f64 {
    let secs = total.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

fn millis(d: Duration) -> u128 {
    (d.as_secs_f64() * 1000.0).round() as u128
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total frames in input: {}", self.frames)?;
        writeln!(f, "=========== BENCHMARK ============")?;
        for s in &self.stages {
            writeln!(f, "{} ({})", s.stage.label(), s.precision)?;
            writeln!(
                f,
                "Load Time: {} ms   Total time: {} ms   fps: {:.2} frames/s",
                millis(s.load),
                millis(s.total),
                s.fps
            )?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Pushes every frame through the pipeline and returns how many were read.
///
/// A source error ends the run like end of stream does.
pub fn run<I>(pipeline: &mut GazePipeline, frames: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<Frame>>,
{
    let mut count = 0;
    for frame in frames {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Stopping benchmark, frame source failed: {e:#}");
                break;
            }
        };
        count += 1;
        if pipeline.process(&frame)?.is_none() {
            debug!("Frame {count}: incomplete pass");
        }
    }
    Ok(count)
}
