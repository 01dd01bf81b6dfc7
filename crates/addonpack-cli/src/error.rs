//! CLI error type and its exit codes

use addonpack_bundle::BundleError;
use addonpack_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Bad arguments, request or configuration
    #[error("{message}")]
    #[diagnostic(code(addonpack::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Chart rendering failed: {message}")]
    #[diagnostic(
        code(addonpack::cli::template),
        help("check that `helm template` succeeds for this chart and values file")
    )]
    Template { message: String },

    /// Pull or export failure
    #[error("{message}")]
    #[diagnostic(code(addonpack::cli::image))]
    Image {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(addonpack::cli::io))]
    Io { message: String },

    #[error("Verification failed: {message}")]
    #[diagnostic(code(addonpack::cli::verify))]
    Verification { message: String },

    #[error("{message}")]
    #[diagnostic(code(addonpack::cli::error))]
    Other { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Image { .. } => exit_codes::IMAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Verification { .. } | CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: None,
        }
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }
}

impl From<BundleError> for CliError {
    fn from(err: BundleError) -> Self {
        let message = err.to_string();
        match err {
            BundleError::InvalidRequest { .. } => CliError::Usage {
                message,
                help: None,
            },
            BundleError::UnsupportedBackend { .. } => CliError::Usage {
                message,
                help: Some("use --image-tool nerdctl, docker or ctr".to_string()),
            },
            BundleError::Templating(e) => CliError::Template {
                message: e.to_string(),
            },
            BundleError::PullFailure { .. } => CliError::Image {
                message,
                help: Some(
                    "re-run with --ignore-pull-errors to package the remaining images".to_string(),
                ),
            },
            BundleError::Export { .. } => CliError::Image {
                message,
                help: None,
            },
            BundleError::Filesystem { .. } => CliError::Io { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            CoreError::UnsupportedBackend { .. }
            | CoreError::InvalidField { .. }
            | CoreError::ChartNotFound { .. }
            | CoreError::InvalidConfig { .. } => CliError::usage(err.to_string()),
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use addonpack_core::ImageReference;

    #[test]
    fn test_exit_codes_follow_failure_kind() {
        let pull: CliError = BundleError::PullFailure {
            image: ImageReference::parse("busybox:1.36").unwrap(),
            reason: "denied".to_string(),
        }
        .into();
        assert_eq!(pull.exit_code(), 4);

        let fs: CliError = BundleError::Filesystem {
            message: "disk full".to_string(),
        }
        .into();
        assert_eq!(fs.exit_code(), 5);

        let tool: CliError = BundleError::UnsupportedBackend {
            name: "podman".to_string(),
        }
        .into();
        assert_eq!(tool.exit_code(), 2);

        assert_eq!(CliError::verification("bad").exit_code(), 1);
    }

    #[test]
    fn test_config_errors_are_usage_errors() {
        let err: CliError = CoreError::InvalidConfig {
            message: "parallel must be at least 1".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }
}
