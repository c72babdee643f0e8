use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::config::{HeadPoseOutputs, ModelsConfig};
use crate::error::ModelError;
use crate::inference::{ChannelOrder, Device, ImageInput, OnnxModel};
use crate::pipeline::HeadPoseEstimator;
use crate::types::{Frame, HeadPoseAngles};

/// Head pose regressor with one scalar output tensor per angle
pub struct HeadPoseModel {
    model: OnnxModel,
    input: ImageInput,
    outputs: HeadPoseOutputs,
    channel_order: ChannelOrder,
}

impl HeadPoseModel {
    pub fn new(path: impl AsRef<Path>, device: Device, config: &ModelsConfig) -> Result<Self, ModelError> {
        let model = OnnxModel::new(path, device, config.intra_threads)?;
        let input = model.image_input(model.first_input()?)?;
        let outputs = config.head_pose_outputs.clone();
        for name in [&outputs.yaw, &outputs.pitch, &outputs.roll] {
            model.require_output(name)?;
        }
        Ok(Self {
            model,
            input,
            outputs,
            channel_order: config.channel_order,
        })
    }

    pub fn load_model(&mut self) -> Result<(), ModelError> {
        self.model.load_model()
    }
}

impl HeadPoseEstimator for HeadPoseModel {
    fn name(&self) -> String {
        "Head Pose".to_string()
    }

    fn predict(&mut self, face: &Frame) -> Result<Option<HeadPoseAngles>> {
        let tensor = self.model.image_tensor(&self.input, face, self.channel_order)?;
        let outputs = self.model.infer(vec![(self.input.name.clone(), tensor)])?;
        Ok(angles_from_outputs(&outputs, &self.outputs))
    }
}

/// Picks yaw, pitch and roll by tensor name, independent of output order
pub fn angles_from_outputs(
    outputs: &HashMap<String, Vec<f32>>,
    names: &HeadPoseOutputs,
) -> Option<HeadPoseAngles> {
    let scalar = |name: &str| outputs.get(name).and_then(|v| v.first().copied());
    Some(HeadPoseAngles {
        yaw: scalar(&names.yaw)?,
        pitch: scalar(&names.pitch)?,
        roll: scalar(&names.roll)?,
    })
}
