use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::benchmark::{Stage, StageTimings};
use crate::config::AppConfig;
use crate::detector::FaceDetectionModel;
use crate::error::ModelError;
use crate::gaze::GazeModel;
use crate::geometry::{self, EyeOffsets};
use crate::head_pose::HeadPoseModel;
use crate::inference::Device;
use crate::landmarks::LandmarkModel;
use crate::types::{
    DetectionBox, EyeLandmarks, Frame, FrameResult, GazeVector, HeadPoseAngles,
};

/// Stage 1. Boxes come back in model order; only the first is used.
pub trait FaceDetector {
    fn name(&self) -> String;
    fn predict(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>>;
}

/// Stage 2. Eye positions inside a face crop.
pub trait LandmarkDetector {
    fn name(&self) -> String;
    fn predict(&mut self, face: &Frame) -> Result<Option<EyeLandmarks>>;
}

/// Stage 3. Yaw, pitch and roll of the face crop.
pub trait HeadPoseEstimator {
    fn name(&self) -> String;
    fn predict(&mut self, face: &Frame) -> Result<Option<HeadPoseAngles>>;
}

/// Stage 4. Combines both eye patches with the head pose.
pub trait GazeEstimator {
    fn name(&self) -> String;
    fn predict(
        &mut self,
        left_eye: &Frame,
        right_eye: &Frame,
        head_pose: &HeadPoseAngles,
    ) -> Result<Option<GazeVector>>;
}

/// The four loaded stages plus the geometry that glues them together.
///
/// Frames are processed one at a time; every stage of a frame finishes before
/// the next frame is looked at.
pub struct GazePipeline {
    face_detector: Box<dyn FaceDetector>,
    landmark_detector: Box<dyn LandmarkDetector>,
    head_pose_estimator: Box<dyn HeadPoseEstimator>,
    gaze_estimator: Box<dyn GazeEstimator>,
    eye_offsets: EyeOffsets,
    timings: StageTimings,
}

impl GazePipeline {
    pub fn new(
        face_detector: Box<dyn FaceDetector>,
        landmark_detector: Box<dyn LandmarkDetector>,
        head_pose_estimator: Box<dyn HeadPoseEstimator>,
        gaze_estimator: Box<dyn GazeEstimator>,
        eye_offsets: EyeOffsets,
    ) -> Self {
        Self {
            face_detector,
            landmark_detector,
            head_pose_estimator,
            gaze_estimator,
            eye_offsets,
            timings: StageTimings::default(),
        }
    }

    /// Builds and loads the four ONNX models named in `config` on `device`.
    ///
    /// Construction plus `load_model()` of each model is recorded as that
    /// stage's load time. The first failure is returned; an
    /// `UnsupportedOperator` inside it means the device cannot run the model.
    pub fn from_config(config: &AppConfig, device: Device) -> Result<Self> {
        let models = &config.models;
        let mut timings = StageTimings::default();

        let path = models.face_detection.path(&models.dir);
        let (face, elapsed) = timed(|| {
            let mut model = FaceDetectionModel::new(&path, device, models)?;
            model.load_model()?;
            Ok(model)
        })
        .with_context(|| format!("loading face detector {}", path.display()))?;
        timings.set_load(Stage::FaceDetection, elapsed);

        let path = models.landmarks.path(&models.dir);
        let (landmarks, elapsed) = timed(|| {
            let mut model = LandmarkModel::new(&path, device, models)?;
            model.load_model()?;
            Ok(model)
        })
        .with_context(|| format!("loading landmark detector {}", path.display()))?;
        timings.set_load(Stage::LandmarkDetection, elapsed);

        let path = models.head_pose.path(&models.dir);
        let (head_pose, elapsed) = timed(|| {
            let mut model = HeadPoseModel::new(&path, device, models)?;
            model.load_model()?;
            Ok(model)
        })
        .with_context(|| format!("loading head pose estimator {}", path.display()))?;
        timings.set_load(Stage::HeadPose, elapsed);

        let path = models.gaze.path(&models.dir);
        let (gaze, elapsed) = timed(|| {
            let mut model = GazeModel::new(&path, device, models)?;
            model.load_model()?;
            Ok(model)
        })
        .with_context(|| format!("loading gaze estimator {}", path.display()))?;
        timings.set_load(Stage::Gaze, elapsed);

        info!("All models loaded on {device}");

        let mut pipeline = Self::new(
            Box::new(face),
            Box::new(landmarks),
            Box::new(head_pose),
            Box::new(gaze),
            config.geometry.eye_offsets(),
        );
        pipeline.timings = timings;
        Ok(pipeline)
    }

    pub fn eye_offsets(&self) -> EyeOffsets {
        self.eye_offsets
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    pub fn stage_names(&self) -> [String; 4] {
        [
            self.face_detector.name(),
            self.landmark_detector.name(),
            self.head_pose_estimator.name(),
            self.gaze_estimator.name(),
        ]
    }

    /// Runs one frame through all four stages.
    ///
    /// `Ok(None)` means some stage found nothing (no face, no landmarks,
    /// an eye patch outside the face, ...) and the frame should be skipped;
    /// later stages are not invoked in that case.
    pub fn process(&mut self, frame: &Frame) -> Result<Option<FrameResult>> {
        let started = Instant::now();
        let boxes = self.face_detector.predict(frame)?;
        self.timings.record(Stage::FaceDetection, started.elapsed());

        let Some(face_box) = boxes.first().copied() else {
            debug!("No face detected");
            return Ok(None);
        };

        let face_rect = geometry::face_rect(&face_box, frame.width(), frame.height());
        let face = geometry::crop(frame, &face_rect);
        if geometry::is_empty(&face) {
            debug!("Face box {face_rect:?} has no area inside the frame");
            return Ok(None);
        }

        let started = Instant::now();
        let landmarks = self.landmark_detector.predict(&face)?;
        self.timings.record(Stage::LandmarkDetection, started.elapsed());

        let Some(landmarks) = landmarks else {
            debug!("No eye landmarks found");
            return Ok(None);
        };

        let (fw, fh) = face.dimensions();
        let left_eye_rect = geometry::eye_rect(&landmarks.left, fw, fh, self.eye_offsets);
        let right_eye_rect = geometry::eye_rect(&landmarks.right, fw, fh, self.eye_offsets);
        let left_eye = geometry::crop(&face, &left_eye_rect);
        let right_eye = geometry::crop(&face, &right_eye_rect);
        if geometry::is_empty(&left_eye) || geometry::is_empty(&right_eye) {
            debug!("Eye patch outside face crop: left {left_eye_rect:?} right {right_eye_rect:?}");
            return Ok(None);
        }

        let started = Instant::now();
        let head_pose = self.head_pose_estimator.predict(&face)?;
        self.timings.record(Stage::HeadPose, started.elapsed());

        let Some(head_pose) = head_pose else {
            debug!("No head pose angles");
            return Ok(None);
        };

        let started = Instant::now();
        let gaze = self
            .gaze_estimator
            .predict(&left_eye, &right_eye, &head_pose)?;
        self.timings.record(Stage::Gaze, started.elapsed());

        let Some(gaze) = gaze else {
            debug!("No gaze vector");
            return Ok(None);
        };

        debug!(
            yaw = head_pose.yaw,
            pitch = head_pose.pitch,
            roll = head_pose.roll,
            "Gaze ({:.3}, {:.3}, {:.3})",
            gaze.x,
            gaze.y,
            gaze.z
        );

        Ok(Some(FrameResult {
            face_box,
            face_rect,
            landmarks,
            left_eye_rect,
            right_eye_rect,
            head_pose,
            gaze,
        }))
    }
}

fn timed<T>(load: impl FnOnce() -> Result<T, ModelError>) -> Result<(T, Duration), ModelError> {
    let started = Instant::now();
    let value = load()?;
    Ok((value, started.elapsed()))
}
