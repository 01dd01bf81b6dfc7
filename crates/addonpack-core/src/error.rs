//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Unsupported image tool: {name} (expected one of: nerdctl, docker, ctr)")]
    UnsupportedBackend { name: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
