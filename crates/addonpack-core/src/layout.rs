//! On-disk bundle layout
//!
//! ```text
//! <addon-name>/
//! └── <version>/
//!     └── <arch>/
//!         ├── charts.tgz
//!         ├── images.list
//!         ├── images.tar.gz   (only when images were discovered)
//!         └── manifest.json   (or metadata.json in simple style)
//! ```
//!
//! The provisioner removes the archive's extraction root during updates, so
//! the top level must be the addon name. [`PathComponent`] makes `.`, `..`,
//! empty strings and separators unrepresentable.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::manifest::{MANIFEST_FILE, METADATA_FILE, ManifestStyle};

pub const CHARTS_ARCHIVE: &str = "charts.tgz";
pub const IMAGES_LIST: &str = "images.list";
pub const IMAGES_ARCHIVE: &str = "images.tar.gz";

/// A validated single path component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathComponent(String);

impl PathComponent {
    /// Validate `value` as one directory name; `field` names it in errors
    pub fn new(field: &str, value: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidField {
            field: field.to_string(),
            message: format!("'{}' {}", value, message),
        };

        if value.trim().is_empty() {
            return Err(invalid("must not be empty"));
        }
        if value == "." || value == ".." {
            return Err(invalid("is not a directory name"));
        }
        if value.contains('/') || value.contains('\\') {
            return Err(invalid("must not contain path separators"));
        }
        if value.chars().any(char::is_control) {
            return Err(invalid("must not contain control characters"));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for PathComponent {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Identity of the addon being packaged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonCoordinates {
    pub name: PathComponent,
    /// Addon type (cni, csi, cri, app). Recorded in simple-style metadata only.
    pub kind: String,
    pub version: PathComponent,
    pub arch: PathComponent,
}

impl AddonCoordinates {
    pub fn new(name: &str, kind: &str, version: &str, arch: &str) -> Result<Self> {
        Ok(Self {
            name: PathComponent::new("name", name)?,
            kind: kind.to_string(),
            version: PathComponent::new("version", version)?,
            arch: PathComponent::new("arch", arch)?,
        })
    }

    /// `<version>/<arch>`, the `path` of every manifest entry
    #[must_use]
    pub fn rel_path(&self) -> String {
        format!("{}/{}", self.version, self.arch)
    }
}

/// Bundle directory tree rooted in a scratch directory
#[derive(Debug, Clone)]
pub struct BundleLayout {
    scratch: PathBuf,
    addon: AddonCoordinates,
}

impl BundleLayout {
    #[must_use]
    pub fn new(scratch: &Path, addon: &AddonCoordinates) -> Self {
        Self {
            scratch: scratch.to_path_buf(),
            addon: addon.clone(),
        }
    }

    /// Create the `<name>/<version>/<arch>` directories
    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(self.arch_dir())?;
        Ok(())
    }

    /// Name of the single top-level directory in the final archive
    #[must_use]
    pub fn top_level_name(&self) -> &str {
        self.addon.name.as_str()
    }

    #[must_use]
    pub fn addon(&self) -> &AddonCoordinates {
        &self.addon
    }

    #[must_use]
    pub fn addon_dir(&self) -> PathBuf {
        self.scratch.join(&self.addon.name)
    }

    #[must_use]
    pub fn arch_dir(&self) -> PathBuf {
        self.addon_dir()
            .join(&self.addon.version)
            .join(&self.addon.arch)
    }

    #[must_use]
    pub fn charts_archive(&self) -> PathBuf {
        self.arch_dir().join(CHARTS_ARCHIVE)
    }

    #[must_use]
    pub fn images_list(&self) -> PathBuf {
        self.arch_dir().join(IMAGES_LIST)
    }

    #[must_use]
    pub fn images_archive(&self) -> PathBuf {
        self.arch_dir().join(IMAGES_ARCHIVE)
    }

    /// Metadata file for the given style
    #[must_use]
    pub fn metadata_file(&self, style: ManifestStyle) -> PathBuf {
        match style {
            ManifestStyle::Digest => self.arch_dir().join(MANIFEST_FILE),
            ManifestStyle::Simple => self.arch_dir().join(METADATA_FILE),
        }
    }

    /// Archive paths of the artifacts present, for display
    #[must_use]
    pub fn entry_paths(&self, style: ManifestStyle) -> Vec<String> {
        let prefix = format!("{}/{}", self.addon.name, self.addon.rel_path());
        let metadata = match style {
            ManifestStyle::Digest => MANIFEST_FILE,
            ManifestStyle::Simple => METADATA_FILE,
        };

        let mut paths = vec![format!("{}/{}", prefix, CHARTS_ARCHIVE)];
        if self.images_archive().is_file() {
            paths.push(format!("{}/{}", prefix, IMAGES_ARCHIVE));
        }
        paths.push(format!("{}/{}", prefix, metadata));
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_component_rejects_unsafe_names() {
        for bad in ["", "  ", ".", "..", "a/b", "a\\b", "x\ny"] {
            assert!(PathComponent::new("name", bad).is_err(), "{:?} accepted", bad);
        }
        assert_eq!(PathComponent::new("name", "calico").unwrap().as_str(), "calico");
        assert_eq!(PathComponent::new("version", "v3.26.1").unwrap().as_str(), "v3.26.1");
    }

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let addon = AddonCoordinates::new("cilium", "cni", "v1.14.2", "arm64").unwrap();
        let layout = BundleLayout::new(temp.path(), &addon);
        layout.create().unwrap();

        assert_eq!(layout.top_level_name(), "cilium");
        assert_eq!(addon.rel_path(), "v1.14.2/arm64");
        assert!(layout.arch_dir().is_dir());
        assert_eq!(
            layout.charts_archive(),
            temp.path().join("cilium/v1.14.2/arm64/charts.tgz")
        );
        assert_eq!(
            layout.metadata_file(ManifestStyle::Digest),
            temp.path().join("cilium/v1.14.2/arm64/manifest.json")
        );
        assert_eq!(
            layout.metadata_file(ManifestStyle::Simple),
            temp.path().join("cilium/v1.14.2/arm64/metadata.json")
        );
    }

    #[test]
    fn test_entry_paths_follow_images_archive() {
        let temp = TempDir::new().unwrap();
        let addon = AddonCoordinates::new("calico", "cni", "v3.26.1", "amd64").unwrap();
        let layout = BundleLayout::new(temp.path(), &addon);
        layout.create().unwrap();

        assert_eq!(
            layout.entry_paths(ManifestStyle::Digest),
            vec![
                "calico/v3.26.1/amd64/charts.tgz",
                "calico/v3.26.1/amd64/manifest.json"
            ]
        );

        std::fs::write(layout.images_archive(), b"x").unwrap();
        assert_eq!(layout.entry_paths(ManifestStyle::Digest).len(), 3);
    }
}
