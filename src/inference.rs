//! Thin layer over ONNX Runtime shared by the four model wrappers: session
//! construction per device, tensor metadata and image-to-tensor conversion.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::imageops::FilterType;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    DirectMLExecutionProvider, ExecutionProviderDispatch, OpenVINOExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue};
use ort::value::{Tensor, ValueType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ModelError;
use crate::types::Frame;

/// Compute device a model is bound to in `load_model()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    #[value(name = "coreml")]
    CoreMl,
    #[value(name = "directml")]
    DirectMl,
    #[value(name = "openvino")]
    OpenVino,
}

impl Device {
    /// Whether this build registers the device's execution provider.
    /// Only the CPU provider is always present.
    pub fn is_compiled_in(self) -> bool {
        match self {
            Device::Cpu => true,
            Device::Cuda => cfg!(feature = "cuda"),
            Device::CoreMl => cfg!(feature = "coreml"),
            Device::DirectMl => cfg!(feature = "directml"),
            Device::OpenVino => cfg!(feature = "openvino"),
        }
    }

    /// Cargo feature enabling this device
    pub fn feature(self) -> Option<&'static str> {
        match self {
            Device::Cpu => None,
            Device::Cuda => Some("cuda"),
            Device::CoreMl => Some("coreml"),
            Device::DirectMl => Some("directml"),
            Device::OpenVino => Some("openvino"),
        }
    }

    fn execution_provider(self) -> ExecutionProviderDispatch {
        match self {
            Device::Cpu => CPUExecutionProvider::default().build(),
            Device::Cuda => CUDAExecutionProvider::default().build(),
            Device::CoreMl => CoreMLExecutionProvider::default().build(),
            Device::DirectMl => DirectMLExecutionProvider::default().build(),
            Device::OpenVino => OpenVINOExecutionProvider::default().build(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Cpu => "CPU",
            Device::Cuda => "CUDA",
            Device::CoreMl => "CoreML",
            Device::DirectMl => "DirectML",
            Device::OpenVino => "OpenVINO",
        };
        f.write_str(name)
    }
}

/// Channel order the network was trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    #[default]
    Bgr,
}

impl ChannelOrder {
    fn source_channels(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }
}

/// Name and declared shape of a model input. Dynamic dimensions are negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
}

impl TensorSpec {
    /// `(width, height)` of an NCHW image input with static spatial dims
    pub fn spatial(&self) -> Option<(u32, u32)> {
        match self.shape.as_slice() {
            [_, 3, h, w] if *h > 0 && *w > 0 => Some((*w as u32, *h as u32)),
            _ => None,
        }
    }

    pub fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| (d > 0).then(|| acc * d as usize))
    }
}

/// An image input resolved against the model's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// One network file bound to one device.
///
/// `new` parses the file on the host runtime to read its tensor metadata;
/// `load_model` builds the session that actually runs on `device`.
pub struct OnnxModel {
    path: PathBuf,
    device: Device,
    intra_threads: usize,
    inputs: Vec<TensorSpec>,
    outputs: Vec<String>,
    session: Option<Session>,
}

impl OnnxModel {
    pub fn new(path: impl AsRef<Path>, device: Device, intra_threads: usize) -> Result<Self, ModelError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ModelError::Load {
                reason: "file not found".to_string(),
                path,
            });
        }

        debug!("Reading model metadata from {}", path.display());
        let probe = build_session(&path, None, 1).map_err(|e| ModelError::Load {
            path: path.clone(),
            reason: format!("{e:#}"),
        })?;

        let inputs = probe
            .inputs
            .iter()
            .map(|input| TensorSpec {
                name: input.name.clone(),
                shape: match &input.input_type {
                    ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
                    _ => Vec::new(),
                },
            })
            .collect();
        let outputs = probe.outputs.iter().map(|o| o.name.clone()).collect();

        Ok(Self {
            path,
            device,
            intra_threads: intra_threads.max(1),
            inputs,
            outputs,
            session: None,
        })
    }

    /// Binds the model to its device.
    ///
    /// Off the CPU, nodes may not fall back to the CPU provider, so the bind
    /// only succeeds when the device runs every operator of the graph.
    pub fn load_model(&mut self) -> Result<(), ModelError> {
        if self.session.is_some() {
            return Ok(());
        }
        if !self.device.is_compiled_in() {
            return Err(ModelError::DeviceUnavailable {
                path: self.path.clone(),
                device: self.device,
                feature: self.device.feature().unwrap_or_default(),
            });
        }
        let session = build_session(&self.path, Some(self.device), self.intra_threads).map_err(|e| {
            ModelError::UnsupportedOperator {
                path: self.path.clone(),
                device: self.device,
                reason: format!("{e:#}"),
            }
        })?;
        info!("Loaded {} on {}", self.path.display(), self.device);
        self.session = Some(session);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Result<&TensorSpec, ModelError> {
        self.inputs
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| self.missing(name))
    }

    pub fn first_input(&self) -> Result<&TensorSpec, ModelError> {
        self.inputs.first().ok_or_else(|| self.missing("<input 0>"))
    }

    pub fn first_output(&self) -> Result<&str, ModelError> {
        self.outputs
            .first()
            .map(String::as_str)
            .ok_or_else(|| self.missing("<output 0>"))
    }

    pub fn require_output(&self, name: &str) -> Result<(), ModelError> {
        if self.outputs.iter().any(|o| o == name) {
            Ok(())
        } else {
            Err(self.missing(name))
        }
    }

    pub fn image_input(&self, spec: &TensorSpec) -> Result<ImageInput, ModelError> {
        let (width, height) = spec.spatial().ok_or_else(|| ModelError::InvalidShape {
            path: self.path.clone(),
            name: spec.name.clone(),
            shape: spec.shape.clone(),
        })?;
        Ok(ImageInput {
            name: spec.name.clone(),
            width,
            height,
        })
    }

    /// Runs one blocking inference request and copies out every output
    pub fn infer(&mut self, inputs: Vec<(String, Tensor<f32>)>) -> Result<HashMap<String, Vec<f32>>, ModelError> {
        let path = self.path.clone();
        let fail = |reason: String| ModelError::Inference {
            path: path.clone(),
            reason,
        };

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ModelError::NotLoaded { path: path.clone() })?;

        let values: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = inputs
            .into_iter()
            .map(|(name, tensor)| (Cow::from(name), SessionInputValue::from(tensor)))
            .collect();
        let outputs = session.run(values).map_err(|e| fail(e.to_string()))?;

        let mut extracted = HashMap::with_capacity(self.outputs.len());
        for name in &self.outputs {
            let value = outputs
                .get(name.as_str())
                .ok_or_else(|| fail(format!("output '{name}' missing from result")))?;
            let (_shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| fail(e.to_string()))?;
            extracted.insert(name.clone(), data.to_vec());
        }
        Ok(extracted)
    }

    /// Resizes `image` to the input's size and wraps it as a `[1, 3, H, W]` tensor
    pub fn image_tensor(&self, input: &ImageInput, image: &Frame, order: ChannelOrder) -> Result<Tensor<f32>, ModelError> {
        let data = image_to_chw(image, input.width, input.height, order);
        let shape = vec![1usize, 3, input.height as usize, input.width as usize];
        Tensor::from_array((shape, data)).map_err(|e| ModelError::Inference {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub fn vector_tensor(&self, spec: &TensorSpec, values: Vec<f32>) -> Result<Tensor<f32>, ModelError> {
        let invalid = || ModelError::InvalidShape {
            path: self.path.clone(),
            name: spec.name.clone(),
            shape: spec.shape.clone(),
        };
        if spec.element_count() != Some(values.len()) {
            return Err(invalid());
        }
        let shape: Vec<usize> = spec.shape.iter().map(|&d| d as usize).collect();
        Tensor::from_array((shape, values)).map_err(|e| ModelError::Inference {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn missing(&self, name: &str) -> ModelError {
        ModelError::MissingTensor {
            path: self.path.clone(),
            name: name.to_string(),
        }
    }
}

/// `device == None` builds a host-only session for reading metadata
fn build_session(path: &Path, device: Option<Device>, intra_threads: usize) -> Result<Session> {
    let level = if device.is_some() {
        GraphOptimizationLevel::Level3
    } else {
        GraphOptimizationLevel::Disable
    };

    let mut builder = Session::builder()?
        .with_optimization_level(level)?
        .with_intra_threads(intra_threads)?;

    if let Some(device) = device {
        builder = builder.with_execution_providers([device.execution_provider().error_on_failure()])?;
        if device != Device::Cpu {
            builder = builder.with_config_entry("session.disable_cpu_ep_fallback", "1")?;
        }
    }

    Ok(builder.commit_from_file(path)?)
}

/// Resizes to `width`x`height` and lays pixels out planar (CHW), raw 0..255.
pub fn image_to_chw(image: &Frame, width: u32, height: u32, order: ChannelOrder) -> Vec<f32> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = image::imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    };

    let mut data = Vec::with_capacity(3 * width as usize * height as usize);
    for channel in order.source_channels() {
        for y in 0..height {
            for x in 0..width {
                data.push(source.get_pixel(x, y)[channel] as f32);
            }
        }
    }
    data
}
