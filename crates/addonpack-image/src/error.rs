//! Error types for image operations

use addonpack_core::{CoreError, ImageReference};
use thiserror::Error;

/// Result type for image operations
pub type Result<T> = std::result::Result<T, ImageError>;

#[derive(Debug, Error)]
pub enum ImageError {
    /// The image tool could not be started
    #[error("Failed to run `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The image tool exited unsuccessfully
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// A pull failed and errors are not being ignored
    #[error("Pull failed for image {image}: {reason}")]
    PullFailed {
        image: ImageReference,
        reason: String,
    },

    /// Saving or compressing the image archive failed
    #[error("Image export failed: {message}")]
    Export { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
