use image::{ImageBuffer, Rgb};

use crate::geometry::PixelRect;

/// A decoded RGB frame as produced by the input feeder
pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Face detection in normalized coordinates, relative to the source frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
}

impl DetectionBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence: 1.0,
        }
    }
}

/// Normalized position inside the face crop
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLandmarks {
    pub left: LandmarkPoint,
    pub right: LandmarkPoint,
}

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadPoseAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl HeadPoseAngles {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.yaw, self.pitch, self.roll]
    }
}

/// Gaze direction in the head/camera frame. `z` is carried but unused.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Everything computed for one frame that made it through all four stages
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub face_box: DetectionBox,
    /// Face rectangle in frame pixels
    pub face_rect: PixelRect,
    pub landmarks: EyeLandmarks,
    /// Eye rectangles in face-crop pixels
    pub left_eye_rect: PixelRect,
    pub right_eye_rect: PixelRect,
    pub head_pose: HeadPoseAngles,
    pub gaze: GazeVector,
}
