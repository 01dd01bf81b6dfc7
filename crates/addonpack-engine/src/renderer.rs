//! Chart renderers

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{EngineError, Result};

/// Renders a chart directory into a multi-document YAML stream
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render `chart`, applying `values` when given, passing `extra_args`
    /// through to the tool. CRD templates are always included.
    async fn render(
        &self,
        chart: &Path,
        values: Option<&Path>,
        extra_args: &[String],
    ) -> Result<String>;
}

/// Renders through `helm template <chart> --include-crds [-f values] [args..]`
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    binary: PathBuf,
}

impl Default for HelmRenderer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
        }
    }
}

impl HelmRenderer {
    /// Use `helm` from PATH
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific helm executable
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed to the helm executable
    #[must_use]
    pub fn command_args(
        &self,
        chart: &Path,
        values: Option<&Path>,
        extra_args: &[String],
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "template".into(),
            chart.as_os_str().to_owned(),
            "--include-crds".into(),
        ];
        if let Some(values) = values {
            args.push("-f".into());
            args.push(values.as_os_str().to_owned());
        }
        args.extend(extra_args.iter().map(OsString::from));
        args
    }
}

#[async_trait]
impl ChartRenderer for HelmRenderer {
    async fn render(
        &self,
        chart: &Path,
        values: Option<&Path>,
        extra_args: &[String],
    ) -> Result<String> {
        let binary = self.binary.display().to_string();
        let args = self.command_args(chart, values, extra_args);
        tracing::debug!(binary = %binary, args = ?args, "rendering chart");

        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::RenderFailed {
                binary,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

/// Arguments of one [`StaticRenderer::render`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub chart: PathBuf,
    pub values: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

/// Renderer returning fixed text, for tests
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    output: Option<String>,
    calls: Arc<Mutex<Vec<RenderCall>>>,
}

impl StaticRenderer {
    /// Always render `output`
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            calls: Arc::default(),
        }
    }

    /// Always fail as if the tool exited non-zero
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChartRenderer for StaticRenderer {
    async fn render(
        &self,
        chart: &Path,
        values: Option<&Path>,
        extra_args: &[String],
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RenderCall {
                chart: chart.to_path_buf(),
                values: values.map(Path::to_path_buf),
                extra_args: extra_args.to_vec(),
            });
        }
        self.output.clone().ok_or_else(|| EngineError::RenderFailed {
            binary: "static".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Error: chart failed to render".to_string(),
        })
    }
}
