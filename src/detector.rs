use std::path::Path;

use anyhow::Result;

use crate::config::ModelsConfig;
use crate::error::ModelError;
use crate::inference::{ChannelOrder, Device, ImageInput, OnnxModel};
use crate::pipeline::FaceDetector;
use crate::types::{DetectionBox, Frame};

/// Values per row of an SSD `DetectionOutput` tensor:
/// `[image_id, label, confidence, xmin, ymin, xmax, ymax]`
const DETECTION_STRIDE: usize = 7;

/// SSD face detector (face-detection-adas family)
pub struct FaceDetectionModel {
    model: OnnxModel,
    input: ImageInput,
    output: String,
    threshold: f32,
    channel_order: ChannelOrder,
}

impl FaceDetectionModel {
    pub fn new(path: impl AsRef<Path>, device: Device, config: &ModelsConfig) -> Result<Self, ModelError> {
        let model = OnnxModel::new(path, device, config.intra_threads)?;
        let input = model.image_input(model.first_input()?)?;
        let output = model.first_output()?.to_string();
        Ok(Self {
            model,
            input,
            output,
            threshold: config.face_confidence,
            channel_order: config.channel_order,
        })
    }

    pub fn load_model(&mut self) -> Result<(), ModelError> {
        self.model.load_model()
    }
}

impl FaceDetector for FaceDetectionModel {
    fn name(&self) -> String {
        format!("Face Detection ({}x{})", self.input.width, self.input.height)
    }

    fn predict(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>> {
        let tensor = self.model.image_tensor(&self.input, frame, self.channel_order)?;
        let mut outputs = self.model.infer(vec![(self.input.name.clone(), tensor)])?;
        let raw = outputs.remove(&self.output).unwrap_or_default();
        Ok(parse_detections(&raw, self.threshold))
    }
}

/// Decodes detection rows, stopping at the first `image_id < 0` terminator.
///
/// Rows keep the order the network produced them in.
pub fn parse_detections(raw: &[f32], threshold: f32) -> Vec<DetectionBox> {
    raw.chunks_exact(DETECTION_STRIDE)
        .take_while(|row| row[0] >= 0.0)
        .filter(|row| row[2] >= threshold)
        .map(|row| DetectionBox {
            xmin: row[3],
            ymin: row[4],
            xmax: row[5],
            ymax: row[6],
            confidence: row[2],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(image_id: f32, conf: f32, b: [f32; 4]) -> Vec<f32> {
        vec![image_id, 1.0, conf, b[0], b[1], b[2], b[3]]
    }

    #[test]
    fn test_parse_detections_threshold_and_order() {
        let mut raw = row(0.0, 0.62, [0.1, 0.1, 0.3, 0.4]);
        raw.extend(row(0.0, 0.20, [0.5, 0.5, 0.6, 0.6]));
        raw.extend(row(0.0, 0.97, [0.2, 0.2, 0.6, 0.8]));

        let boxes = parse_detections(&raw, 0.5);
        assert_eq!(boxes.len(), 2);
        // no re-sorting by confidence
        assert_eq!(boxes[0].confidence, 0.62);
        assert_eq!(boxes[1].xmax, 0.6);
        assert_eq!(boxes[1].ymax, 0.8);
    }

    #[test]
    fn test_parse_detections_stops_at_terminator() {
        let mut raw = row(0.0, 0.9, [0.1, 0.1, 0.2, 0.2]);
        raw.extend(row(-1.0, 0.0, [0.0; 4]));
        raw.extend(row(0.0, 0.99, [0.3, 0.3, 0.4, 0.4]));
        assert_eq!(parse_detections(&raw, 0.5).len(), 1);
    }

    #[test]
    fn test_parse_detections_empty_and_partial() {
        assert!(parse_detections(&[], 0.5).is_empty());
        // trailing partial row is ignored
        let mut raw = row(0.0, 0.9, [0.1, 0.1, 0.2, 0.2]);
        raw.extend([0.0, 1.0, 0.9]);
        assert_eq!(parse_detections(&raw, 0.5).len(), 1);
    }

    #[test]
    fn test_parse_detections_is_deterministic() {
        let raw = row(0.0, 0.8, [0.25, 0.1, 0.75, 0.9]);
        assert_eq!(parse_detections(&raw, 0.5), parse_detections(&raw, 0.5));
    }
}
