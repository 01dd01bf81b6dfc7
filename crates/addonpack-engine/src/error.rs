//! Error types for chart rendering

use thiserror::Error;

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The templating tool could not be started
    #[error("Failed to run `{binary}`: {source}. Is helm installed?")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The templating tool exited unsuccessfully
    #[error("`{binary} template` failed ({status}): {stderr}")]
    RenderFailed {
        binary: String,
        status: String,
        stderr: String,
    },

    #[error("Rendered output is not valid UTF-8: {0}")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}
