//! Pipeline, feeder and benchmark harness wired together with scripted
//! stages, so no model files are required.

use anyhow::{anyhow, Result};
use image::Rgb;

use gaze_pointer::benchmark::{self, BenchmarkReport, Stage};
use gaze_pointer::feeder::{FrameSource, ImageSource, InputFeeder, InputType};
use gaze_pointer::geometry::{EyeOffsets, PixelRect};
use gaze_pointer::pipeline::{
    FaceDetector, GazeEstimator, GazePipeline, HeadPoseEstimator, LandmarkDetector,
};
use gaze_pointer::pointer::{DryRunBackend, MouseController, Precision, Speed};
use gaze_pointer::types::{
    DetectionBox, EyeLandmarks, Frame, GazeVector, HeadPoseAngles, LandmarkPoint,
};

/// Finds a face only in frames whose top-left pixel is bright
struct BrightFace;
struct FixedLandmarks;
struct FixedPose;
struct PoseGaze;

impl FaceDetector for BrightFace {
    fn name(&self) -> String {
        "bright face".into()
    }
    fn predict(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>> {
        if frame.get_pixel(0, 0)[0] > 128 {
            Ok(vec![DetectionBox::new(0.2, 0.2, 0.6, 0.8)])
        } else {
            Ok(vec![])
        }
    }
}

impl LandmarkDetector for FixedLandmarks {
    fn name(&self) -> String {
        "landmarks".into()
    }
    fn predict(&mut self, _face: &Frame) -> Result<Option<EyeLandmarks>> {
        Ok(Some(EyeLandmarks {
            left: LandmarkPoint::new(0.3, 0.4),
            right: LandmarkPoint::new(0.7, 0.4),
        }))
    }
}

impl HeadPoseEstimator for FixedPose {
    fn name(&self) -> String {
        "pose".into()
    }
    fn predict(&mut self, _face: &Frame) -> Result<Option<HeadPoseAngles>> {
        Ok(Some(HeadPoseAngles::new(10.0, -5.0, 0.0)))
    }
}

impl GazeEstimator for PoseGaze {
    fn name(&self) -> String {
        "gaze".into()
    }
    fn predict(
        &mut self,
        _left: &Frame,
        _right: &Frame,
        pose: &HeadPoseAngles,
    ) -> Result<Option<GazeVector>> {
        Ok(Some(GazeVector {
            x: pose.yaw / 100.0,
            y: pose.pitch / 100.0,
            z: -1.0,
        }))
    }
}

fn pipeline() -> GazePipeline {
    GazePipeline::new(
        Box::new(BrightFace),
        Box::new(FixedLandmarks),
        Box::new(FixedPose),
        Box::new(PoseGaze),
        EyeOffsets::TUNED,
    )
}

fn frame(level: u8) -> Frame {
    Frame::from_pixel(640, 480, Rgb([level, level, level]))
}

/// Plays back a fixed list of frames, optionally failing at the end
struct Clip {
    frames: Vec<Frame>,
    fail_at_end: bool,
}

impl FrameSource for Clip {
    fn input_shape(&self) -> (u32, u32) {
        (640, 480)
    }
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frames.is_empty() {
            if self.fail_at_end {
                return Err(anyhow!("truncated stream"));
            }
            return Ok(None);
        }
        Ok(Some(self.frames.remove(0)))
    }
}

#[test]
fn test_still_image_runs_through_all_stages() {
    let mut feeder = InputFeeder::with_source(InputType::Image, Box::new(ImageSource::from_frame(frame(200))));
    let mut pipeline = pipeline();

    let results: Vec<_> = feeder
        .next_batch()
        .map(|f| pipeline.process(&f.unwrap()).unwrap())
        .collect();
    assert_eq!(results.len(), 1);

    let result = results[0].as_ref().unwrap();
    assert_eq!(result.face_rect, PixelRect::new(128, 96, 384, 384));
    assert_eq!(result.left_eye_rect, PixelRect::new(41, 95, 111, 135));
    assert_eq!(result.right_eye_rect, PixelRect::new(144, 95, 214, 135));
}

#[test]
fn test_benchmark_counts_every_frame() {
    let clip = Clip {
        frames: vec![frame(200), frame(10), frame(200), frame(200)],
        fail_at_end: false,
    };
    let mut feeder = InputFeeder::with_source(InputType::Video, Box::new(clip));
    let mut pipeline = pipeline();

    let frames = benchmark::run(&mut pipeline, feeder.next_batch()).unwrap();
    assert_eq!(frames, 4);

    let timings = pipeline.timings();
    assert_eq!(timings.calls(Stage::FaceDetection), 4);
    // the dark frame stops after detection
    assert_eq!(timings.calls(Stage::LandmarkDetection), 3);
    assert_eq!(timings.calls(Stage::Gaze), 3);

    let report = BenchmarkReport::new(frames, timings, ["FP16-INT8"; 4]);
    let text = report.to_string();
    assert!(text.starts_with("Total frames in input: 4\n"));
    assert!(text.contains("(FP16-INT8)"));
    assert_eq!(report.stages.len(), 4);
}

#[test]
fn test_decode_failure_ends_benchmark_normally() {
    let clip = Clip {
        frames: vec![frame(200), frame(200)],
        fail_at_end: true,
    };
    let mut feeder = InputFeeder::with_source(InputType::Video, Box::new(clip));
    let mut pipeline = pipeline();

    let frames = benchmark::run(&mut pipeline, feeder.next_batch()).unwrap();
    assert_eq!(frames, 2);
}

#[test]
fn test_gaze_drives_dry_run_pointer() {
    let mut pipeline = pipeline();
    let mut mouse = MouseController::new(DryRunBackend::new((1920, 1080)), Precision::Medium, Speed::Instant);

    // the pointer may start anywhere; the run recentres it first
    mouse.move_by_gaze(0.5, 0.5, false).unwrap();
    mouse.move_to_center().unwrap();
    assert_eq!(mouse.backend().position(), (960, 540));

    let result = pipeline.process(&frame(200)).unwrap().unwrap();
    mouse
        .move_by_gaze(result.gaze.x, result.gaze.y, false)
        .unwrap();

    // gaze (0.1, -0.05) at 500 px per unit
    assert_eq!(mouse.backend().position(), (960 + 50, 540 + 25));
}
