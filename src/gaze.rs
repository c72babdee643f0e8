use std::path::Path;

use anyhow::Result;

use crate::config::{GazeInputs, ModelsConfig};
use crate::error::ModelError;
use crate::inference::{ChannelOrder, Device, ImageInput, OnnxModel, TensorSpec};
use crate::pipeline::GazeEstimator;
use crate::types::{Frame, GazeVector, HeadPoseAngles};

/// Gaze regressor fed with both eye patches and the head pose angles
pub struct GazeModel {
    model: OnnxModel,
    left_eye: ImageInput,
    right_eye: ImageInput,
    angles: TensorSpec,
    output: String,
    channel_order: ChannelOrder,
}

impl GazeModel {
    pub fn new(path: impl AsRef<Path>, device: Device, config: &ModelsConfig) -> Result<Self, ModelError> {
        let model = OnnxModel::new(path, device, config.intra_threads)?;
        let GazeInputs {
            left_eye,
            right_eye,
            head_pose_angles,
        } = &config.gaze_inputs;
        let left_eye = model.image_input(model.input(left_eye)?)?;
        let right_eye = model.image_input(model.input(right_eye)?)?;
        let angles = model.input(head_pose_angles)?.clone();
        let output = model.first_output()?.to_string();
        Ok(Self {
            model,
            left_eye,
            right_eye,
            angles,
            output,
            channel_order: config.channel_order,
        })
    }

    pub fn load_model(&mut self) -> Result<(), ModelError> {
        self.model.load_model()
    }
}

impl GazeEstimator for GazeModel {
    fn name(&self) -> String {
        "Gaze Estimation".to_string()
    }

    fn predict(
        &mut self,
        left_eye: &Frame,
        right_eye: &Frame,
        head_pose: &HeadPoseAngles,
    ) -> Result<Option<GazeVector>> {
        let left = self.model.image_tensor(&self.left_eye, left_eye, self.channel_order)?;
        let right = self.model.image_tensor(&self.right_eye, right_eye, self.channel_order)?;
        let angles = self.model.vector_tensor(&self.angles, head_pose.to_array().to_vec())?;

        let mut outputs = self.model.infer(vec![
            (self.left_eye.name.clone(), left),
            (self.right_eye.name.clone(), right),
            (self.angles.name.clone(), angles),
        ])?;
        let raw = outputs.remove(&self.output).unwrap_or_default();
        Ok(parse_gaze_vector(&raw))
    }
}

/// First row of the output; `z` defaults to 0 for two-component models
pub fn parse_gaze_vector(raw: &[f32]) -> Option<GazeVector> {
    match raw {
        [x, y, z, ..] => Some(GazeVector { x: *x, y: *y, z: *z }),
        [x, y] => Some(GazeVector { x: *x, y: *y, z: 0.0 }),
        _ => None,
    }
}
