//! Packaging request - the immutable input of one packaging run

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::layout::AddonCoordinates;
use crate::manifest::{DigestAlgorithm, ManifestStyle};

pub const DEFAULT_ARCH: &str = "amd64";
pub const DEFAULT_ADDON_TYPE: &str = "cni";
pub const DEFAULT_PARALLEL: usize = 4;
pub const DEFAULT_CTR_NAMESPACE: &str = "k8s.io";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._+-]+").expect("valid filename pattern"));

/// Local image tool used to inspect, pull and save images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTool {
    #[default]
    Nerdctl,
    Docker,
    /// containerd's `ctr`; operates inside a namespace
    Ctr,
}

impl ImageTool {
    pub const ALL: [ImageTool; 3] = [ImageTool::Nerdctl, ImageTool::Docker, ImageTool::Ctr];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImageTool::Nerdctl => "nerdctl",
            ImageTool::Docker => "docker",
            ImageTool::Ctr => "ctr",
        }
    }

    /// Whether the tool takes a containerd namespace
    #[must_use]
    pub fn is_namespaced(self) -> bool {
        matches!(self, ImageTool::Ctr)
    }
}

impl fmt::Display for ImageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageTool {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        ImageTool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| CoreError::UnsupportedBackend {
                name: s.to_string(),
            })
    }
}

/// Everything one packaging run needs
#[derive(Debug, Clone)]
pub struct PackagingRequest {
    /// Unpacked chart directory
    pub chart_path: PathBuf,
    /// Explicit values override; see [`crate::values::resolve_values_file`]
    pub values: Option<PathBuf>,
    pub addon: AddonCoordinates,
    /// Destination of the final `.tar.gz`
    pub output: PathBuf,
    pub image_tool: ImageTool,
    /// Override for the image tool executable
    pub tool_binary: Option<PathBuf>,
    /// Maximum concurrent pulls (at least 1)
    pub parallel: usize,
    /// containerd namespace for namespaced tools
    pub namespace: String,
    /// Pull missing images before saving
    pub pull: bool,
    /// Downgrade pull failures to warnings
    pub ignore_pull_errors: bool,
    /// Extra arguments for the templating tool
    pub helm_args: Vec<String>,
    pub manifest_style: ManifestStyle,
    pub digest_algorithm: DigestAlgorithm,
}

impl PackagingRequest {
    /// Request with defaults for everything but the chart and addon identity
    #[must_use]
    pub fn new(chart_path: impl Into<PathBuf>, addon: AddonCoordinates) -> Self {
        let output = PathBuf::from(default_output_name(&addon));
        Self {
            chart_path: chart_path.into(),
            values: None,
            addon,
            output,
            image_tool: ImageTool::default(),
            tool_binary: None,
            parallel: DEFAULT_PARALLEL,
            namespace: DEFAULT_CTR_NAMESPACE.to_string(),
            pull: true,
            ignore_pull_errors: false,
            helm_args: Vec::new(),
            manifest_style: ManifestStyle::default(),
            digest_algorithm: DigestAlgorithm::default(),
        }
    }

    /// Check inputs that can be checked before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.chart_path.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: self.chart_path.display().to_string(),
            });
        }
        if let Some(values) = &self.values {
            if !values.is_file() {
                return Err(CoreError::InvalidField {
                    field: "values".to_string(),
                    message: format!("{} is not a file", values.display()),
                });
            }
        }
        if self.parallel == 0 {
            return Err(CoreError::InvalidField {
                field: "parallel".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.output.as_os_str().is_empty() {
            return Err(CoreError::InvalidField {
                field: "output".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Chart directory base name, used as the root inside `charts.tgz`
    pub fn chart_dir_name(&self) -> Result<String> {
        chart_dir_name(&self.chart_path)
    }
}

/// Replace every run of characters outside `[A-Za-z0-9._+-]` with `_`
#[must_use]
pub fn safe_filename(s: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(s, "_").into_owned()
}

/// `<name>-<version>-<arch>.tar.gz`
#[must_use]
pub fn default_output_name(addon: &AddonCoordinates) -> String {
    format!(
        "{}-{}-{}.tar.gz",
        safe_filename(addon.name.as_str()),
        safe_filename(addon.version.as_str()),
        safe_filename(addon.arch.as_str())
    )
}

fn chart_dir_name(chart_path: &Path) -> Result<String> {
    // canonicalize so `.` or `charts/cilium/` still yield a real name
    let resolved = chart_path.canonicalize()?;
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| CoreError::InvalidField {
            field: "chart-path".to_string(),
            message: format!("{} has no directory name", chart_path.display()),
        })
}
