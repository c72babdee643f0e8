use std::path::PathBuf;

use thiserror::Error;

use crate::inference::Device;

/// Failures in the model wrapper lifecycle.
///
/// `UnsupportedOperator` is fatal: there is no fallback device, the caller is
/// expected to abort (the binaries exit with code 2).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("model {} cannot run on {device}: {reason}", path.display())]
    UnsupportedOperator {
        path: PathBuf,
        device: Device,
        reason: String,
    },

    #[error("cannot load model {} on {device}: built without the `{feature}` feature", path.display())]
    DeviceUnavailable {
        path: PathBuf,
        device: Device,
        feature: &'static str,
    },

    #[error("model {} was used before load_model()", path.display())]
    NotLoaded { path: PathBuf },

    #[error("model {} has no tensor named '{name}'", path.display())]
    MissingTensor { path: PathBuf, name: String },

    #[error("model {} has unusable shape for '{name}': {shape:?}", path.display())]
    InvalidShape {
        path: PathBuf,
        name: String,
        shape: Vec<i64>,
    },

    #[error("inference failed for {}: {reason}", path.display())]
    Inference { path: PathBuf, reason: String },
}

impl ModelError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::UnsupportedOperator { .. })
    }
}

/// Process exit status for a failed run: 2 when a model cannot run on the
/// requested device, 1 otherwise.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    let unsupported = err
        .chain()
        .filter_map(|e| e.downcast_ref::<ModelError>())
        .any(ModelError::is_fatal);
    if unsupported {
        2
    } else {
        1
    }
}
