//! Packager configuration file
//!
//! Optional defaults stored in `~/.config/addonpack/config.yaml`:
//!
//! ```yaml
//! imageTool: ctr
//! parallel: 8
//! ctrNamespace: k8s.io
//! helmBinary: /usr/local/bin/helm
//! manifestStyle: digest
//! digestAlgorithm: md5
//! helmArgs: ["--kube-version", "1.27.0"]
//! ```
//!
//! Every field is optional; command-line flags take precedence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::manifest::{DigestAlgorithm, ManifestStyle};
use crate::request::ImageTool;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackagerConfig {
    #[serde(default)]
    pub image_tool: Option<String>,

    #[serde(default)]
    pub parallel: Option<usize>,

    #[serde(default)]
    pub ctr_namespace: Option<String>,

    /// Templating tool executable (default: `helm` on PATH)
    #[serde(default)]
    pub helm_binary: Option<PathBuf>,

    /// Image tool executable (default: the tool name on PATH)
    #[serde(default)]
    pub tool_binary: Option<PathBuf>,

    #[serde(default)]
    pub manifest_style: Option<ManifestStyle>,

    #[serde(default)]
    pub digest_algorithm: Option<DigestAlgorithm>,

    /// Prepended to `--helm-arg` values
    #[serde(default)]
    pub helm_args: Vec<String>,
}

impl PackagerConfig {
    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("addonpack").join("config.yaml"))
    }

    /// The configured image tool, if any; unknown names are rejected here
    pub fn image_tool(&self) -> Result<Option<ImageTool>> {
        self.image_tool.as_deref().map(str::parse).transpose()
    }

    fn validate(&self) -> Result<()> {
        self.image_tool()?;
        if self.parallel == Some(0) {
            return Err(CoreError::InvalidConfig {
                message: "parallel must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"imageTool: ctr
parallel: 8
ctrNamespace: custom
helmBinary: /opt/helm
manifestStyle: simple
digestAlgorithm: sha256
helmArgs:
  - --kube-version
  - "1.27.0"
"#,
        )
        .unwrap();

        let config = PackagerConfig::load_from(&path).unwrap();
        assert_eq!(config.image_tool().unwrap(), Some(ImageTool::Ctr));
        assert_eq!(config.parallel, Some(8));
        assert_eq!(config.ctr_namespace.as_deref(), Some("custom"));
        assert_eq!(config.helm_binary, Some(PathBuf::from("/opt/helm")));
        assert_eq!(config.manifest_style, Some(ManifestStyle::Simple));
        assert_eq!(config.digest_algorithm, Some(DigestAlgorithm::Sha256));
        assert_eq!(config.helm_args, vec!["--kube-version", "1.27.0"]);
    }

    #[test]
    fn test_empty_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "{}\n").unwrap();

        let config = PackagerConfig::load_from(&path).unwrap();
        assert_eq!(config, PackagerConfig::default());
        assert_eq!(config.image_tool().unwrap(), None);
    }

    #[test]
    fn test_unsupported_tool_rejected_at_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "imageTool: podman\n").unwrap();

        assert!(matches!(
            PackagerConfig::load_from(&path),
            Err(CoreError::UnsupportedBackend { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "paralel: 3\n").unwrap();

        assert!(matches!(
            PackagerConfig::load_from(&path),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
