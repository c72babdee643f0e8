//! Gaze-driven pointer control: face detection, facial landmarks, head pose
//! and gaze estimation chained over camera, video or still-image input.

pub mod args;
pub mod benchmark;
#[cfg(feature = "camera")]
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod feeder;
pub mod gaze;
pub mod geometry;
pub mod head_pose;
pub mod inference;
pub mod landmarks;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod pointer;
pub mod types;

pub use error::ModelError;
pub use pipeline::GazePipeline;
