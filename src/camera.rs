use anyhow::{anyhow, Context, Result};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use tracing::{info, warn};

use crate::feeder::FrameSource;
use crate::types::Frame;

/// Webcam stream. Never runs dry on its own.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn new(index: usize) -> Result<Self> {
        let cam_index = CameraIndex::Index(index as u32);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(cam_index, requested).context("Failed to create camera instance")?;

        camera
            .open_stream()
            .map_err(|e| anyhow!(e))
            .context("Failed to open camera stream")?;

        info!("Opened camera: {} ({})", camera.info().human_name(), camera.camera_format());
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    fn input_shape(&self) -> (u32, u32) {
        let resolution = self.camera.resolution();
        (resolution.width(), resolution.height())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| anyhow!(e))
            .context("Failed to grab camera frame")?;
        let frame = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow!(e))
            .context("Failed to decode camera frame")?;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}
