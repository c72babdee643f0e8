use std::path::Path;

use anyhow::Result;

use crate::config::ModelsConfig;
use crate::error::ModelError;
use crate::inference::{ChannelOrder, Device, ImageInput, OnnxModel};
use crate::pipeline::LandmarkDetector;
use crate::types::{EyeLandmarks, Frame, LandmarkPoint};

/// Five-point facial landmark regressor. Only the two eye points are kept.
pub struct LandmarkModel {
    model: OnnxModel,
    input: ImageInput,
    output: String,
    channel_order: ChannelOrder,
}

impl LandmarkModel {
    pub fn new(path: impl AsRef<Path>, device: Device, config: &ModelsConfig) -> Result<Self, ModelError> {
        let model = OnnxModel::new(path, device, config.intra_threads)?;
        let input = model.image_input(model.first_input()?)?;
        let output = model.first_output()?.to_string();
        Ok(Self {
            model,
            input,
            output,
            channel_order: config.channel_order,
        })
    }

    pub fn load_model(&mut self) -> Result<(), ModelError> {
        self.model.load_model()
    }
}

impl LandmarkDetector for LandmarkModel {
    fn name(&self) -> String {
        "Facial Landmarks".to_string()
    }

    fn predict(&mut self, face: &Frame) -> Result<Option<EyeLandmarks>> {
        let tensor = self.model.image_tensor(&self.input, face, self.channel_order)?;
        let mut outputs = self.model.infer(vec![(self.input.name.clone(), tensor)])?;
        let raw = outputs.remove(&self.output).unwrap_or_default();
        Ok(parse_eye_landmarks(&raw))
    }
}

/// Reads the flat output as (x, y) pairs; the first two are left and right eye
pub fn parse_eye_landmarks(raw: &[f32]) -> Option<EyeLandmarks> {
    let mut points = raw
        .chunks_exact(2)
        .map(|p| LandmarkPoint::new(p[0], p[1]));
    let left = points.next()?;
    let right = points.next()?;
    Some(EyeLandmarks { left, right })
}
