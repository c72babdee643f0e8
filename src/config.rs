use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geometry::EyeOffsets;
use crate::inference::ChannelOrder;
use crate::pointer::{Precision, Speed};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub geometry: GeometryConfig,
    pub pointer: PointerConfig,
    pub display: DisplayConfig,
}

/// One network, located at `<dir>/<name>/<precision>/<name>.onnx`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub precision: String,
}

impl ModelSpec {
    pub fn new(name: &str, precision: &str) -> Self {
        Self {
            name: name.to_string(),
            precision: precision.to_string(),
        }
    }

    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
            .join(&self.precision)
            .join(format!("{}.onnx", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub face_detection: ModelSpec,
    pub landmarks: ModelSpec,
    pub head_pose: ModelSpec,
    pub gaze: ModelSpec,
    /// Detections below this confidence are dropped by the face detector
    pub face_confidence: f32,
    pub channel_order: ChannelOrder,
    pub head_pose_outputs: HeadPoseOutputs,
    pub gaze_inputs: GazeInputs,
    pub intra_threads: usize,
}

/// Output tensor carrying each angle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseOutputs {
    pub yaw: String,
    pub pitch: String,
    pub roll: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeInputs {
    pub left_eye: String,
    pub right_eye: String,
    pub head_pose_angles: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub eye_half_width: i32,
    pub eye_half_height: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    pub precision: Precision,
    pub speed: Speed,
    /// Flip horizontal motion, for mirrored camera images
    pub invert_x: bool,
    /// Screen size reported when no real pointer backend is available
    pub dry_run_screen: (i32, i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub gaze_arrow_length: f32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models/intel"),
            face_detection: ModelSpec::new("face-detection-adas-0001", "FP16"),
            landmarks: ModelSpec::new("landmarks-regression-retail-0009", "FP16"),
            head_pose: ModelSpec::new("head-pose-estimation-adas-0001", "FP16"),
            gaze: ModelSpec::new("gaze-estimation-adas-0002", "FP16"),
            face_confidence: 0.5,
            channel_order: ChannelOrder::Bgr,
            head_pose_outputs: HeadPoseOutputs::default(),
            gaze_inputs: GazeInputs::default(),
            intra_threads: 4,
        }
    }
}

impl ModelsConfig {
    /// Precision labels in pipeline stage order
    pub fn precisions(&self) -> [&str; 4] {
        [
            &self.face_detection.precision,
            &self.landmarks.precision,
            &self.head_pose.precision,
            &self.gaze.precision,
        ]
    }
}

impl Default for HeadPoseOutputs {
    fn default() -> Self {
        Self {
            yaw: "angle_y_fc".to_string(),
            pitch: "angle_p_fc".to_string(),
            roll: "angle_r_fc".to_string(),
        }
    }
}

impl Default for GazeInputs {
    fn default() -> Self {
        Self {
            left_eye: "left_eye_image".to_string(),
            right_eye: "right_eye_image".to_string(),
            head_pose_angles: "head_pose_angles".to_string(),
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        let offsets = EyeOffsets::default();
        Self {
            eye_half_width: offsets.half_width,
            eye_half_height: offsets.half_height,
        }
    }
}

impl GeometryConfig {
    pub fn eye_offsets(&self) -> EyeOffsets {
        EyeOffsets::new(self.eye_half_width, self.eye_half_height)
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            precision: Precision::Medium,
            speed: Speed::Fast,
            invert_x: false,
            dry_run_screen: (1920, 1080),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            gaze_arrow_length: 100.0,
        }
    }
}

impl AppConfig {
    /// Loads `path`, creating it with defaults when missing.
    ///
    /// Missing fields take their defaults. An unparsable file is reported and
    /// replaced by defaults for this run, but left untouched on disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Configuration file not found. Creating default at {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Error parsing config {}: {}. Using defaults.", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_layout() {
        let spec = ModelSpec::new("gaze-estimation-adas-0002", "FP16-INT8");
        assert_eq!(
            spec.path(Path::new("models/intel")),
            PathBuf::from("models/intel/gaze-estimation-adas-0002/FP16-INT8/gaze-estimation-adas-0002.onnx")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{ "geometry": { "eye_half_width": 50 }, "pointer": { "precision": "high" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.geometry.eye_offsets(), EyeOffsets::new(50, 20));
        assert_eq!(config.pointer.precision, Precision::High);
        assert_eq!(config.pointer.speed, Speed::Fast);
        assert_eq!(config.models, ModelsConfig::default());
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_precisions_in_stage_order() {
        let mut models = ModelsConfig::default();
        models.face_detection.precision = "FP32".into();
        assert_eq!(models.precisions(), ["FP32", "FP16", "FP16", "FP16"]);
    }
}
