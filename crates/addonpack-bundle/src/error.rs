//! Error types for bundle assembly

use addonpack_core::{CoreError, ImageReference};
use addonpack_engine::EngineError;
use addonpack_image::ImageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BundleError>;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Chart rendering failed: {0}")]
    Templating(#[from] EngineError),

    #[error("Pull failed for image {image}: {reason}")]
    PullFailure {
        image: ImageReference,
        reason: String,
    },

    #[error("Unsupported image tool: {name} (expected one of: nerdctl, docker, ctr)")]
    UnsupportedBackend { name: String },

    #[error("Image export failed: {message}")]
    Export { message: String },

    #[error("Filesystem error: {message}")]
    Filesystem { message: String },
}

impl BundleError {
    pub(crate) fn filesystem(context: &str, err: impl std::fmt::Display) -> Self {
        BundleError::Filesystem {
            message: format!("{}: {}", context, err),
        }
    }
}

impl From<CoreError> for BundleError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedBackend { name } => BundleError::UnsupportedBackend { name },
            CoreError::ChartNotFound { .. } | CoreError::InvalidField { .. } => {
                BundleError::InvalidRequest {
                    message: err.to_string(),
                }
            }
            other => BundleError::Filesystem {
                message: other.to_string(),
            },
        }
    }
}

impl From<ImageError> for BundleError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::PullFailed { image, reason } => BundleError::PullFailure { image, reason },
            ImageError::Core(core) => core.into(),
            ImageError::Io(e) => BundleError::Filesystem {
                message: e.to_string(),
            },
            other => BundleError::Export {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        BundleError::Filesystem {
            message: err.to_string(),
        }
    }
}
