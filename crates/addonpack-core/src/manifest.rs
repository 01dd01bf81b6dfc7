//! Bundle manifests
//!
//! Every `<version>/<arch>` directory of a bundle carries a `manifest.json`:
//!
//! ```json
//! [
//!   { "name": "charts.tgz", "digest": "<md5>", "path": "v1.14.2/amd64" },
//!   { "name": "images.tar.gz", "digest": "<md5>", "path": "v1.14.2/amd64" }
//! ]
//! ```
//!
//! The provisioner re-hashes the named files before using them. The older
//! single-file `metadata.json` layout is still available as
//! [`ManifestStyle::Simple`].

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::image::ImageReference;

/// Per-artifact manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Combined metadata file name (simple style)
pub const METADATA_FILE: &str = "metadata.json";

/// Content hash written into manifest entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Hash a file, streaming its contents
    pub fn hash_file(self, path: &Path) -> Result<String> {
        let reader = BufReader::new(File::open(path)?);
        match self {
            DigestAlgorithm::Md5 => hash_reader::<Md5>(reader),
            DigestAlgorithm::Sha256 => hash_reader::<Sha256>(reader),
        }
    }

    /// Hash an in-memory buffer
    #[must_use]
    pub fn hash_bytes(self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Guess the algorithm from a hex digest's length
    #[must_use]
    pub fn detect(digest: &str) -> Option<Self> {
        match digest.len() {
            32 => Some(DigestAlgorithm::Md5),
            64 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Md5 => f.write_str("md5"),
            DigestAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            other => Err(CoreError::InvalidField {
                field: "digest algorithm".to_string(),
                message: format!("'{}' is not one of: md5, sha256", other),
            }),
        }
    }
}

/// Which metadata file a bundle carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestStyle {
    /// One `metadata.json` describing the addon and its images
    Simple,
    /// `manifest.json` with a digest per artifact
    #[default]
    Digest,
}

impl FromStr for ManifestStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(ManifestStyle::Simple),
            "digest" | "digest-manifest" => Ok(ManifestStyle::Digest),
            other => Err(CoreError::InvalidField {
                field: "manifest style".to_string(),
                message: format!("'{}' is not one of: simple, digest", other),
            }),
        }
    }
}

/// One artifact listed in `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// File name inside the arch directory
    pub name: String,
    /// Hex content digest
    pub digest: String,
    /// `<version>/<arch>`
    pub path: String,
}

impl ManifestEntry {
    /// Path of the artifact relative to the addon directory
    #[must_use]
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

/// Contents of a `manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build entries for the named artifacts of an arch directory.
    ///
    /// Names that do not exist as files are skipped, so a bundle without
    /// images lists only its chart archive.
    pub fn generate(
        arch_dir: &Path,
        rel_path: &str,
        names: &[&str],
        algorithm: DigestAlgorithm,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let file = arch_dir.join(name);
            if !file.is_file() {
                continue;
            }
            entries.push(ManifestEntry {
                name: (*name).to_string(),
                digest: algorithm.hash_file(&file)?,
                path: rel_path.to_string(),
            });
        }
        Ok(Self { entries })
    }

    /// Parse a `manifest.json` document
    pub fn parse(content: &[u8]) -> Result<Self> {
        serde_json::from_slice(content).map_err(|e| CoreError::InvalidManifest {
            message: e.to_string(),
        })
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write to `path` as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Re-hash every entry and compare against the recorded digest.
    ///
    /// `read_file` receives [`ManifestEntry::relative_path`].
    pub fn verify_files<F>(&self, read_file: F) -> VerificationResult
    where
        F: Fn(&str) -> std::io::Result<Vec<u8>>,
    {
        self.verify_with(|entry, algorithm| {
            read_file(&entry.relative_path())
                .ok()
                .map(|content| algorithm.hash_bytes(&content))
        })
    }

    /// Compare recorded digests against digests computed by `actual_digest`.
    ///
    /// `actual_digest` returns `None` when the artifact is missing.
    pub fn verify_with<F>(&self, mut actual_digest: F) -> VerificationResult
    where
        F: FnMut(&ManifestEntry, DigestAlgorithm) -> Option<String>,
    {
        let mut result = VerificationResult {
            valid: true,
            mismatched: Vec::new(),
            missing: Vec::new(),
        };

        for entry in &self.entries {
            let path = entry.relative_path();
            let Some(algorithm) = DigestAlgorithm::detect(&entry.digest) else {
                result.valid = false;
                result.mismatched.push(MismatchedFile {
                    path,
                    expected: entry.digest.clone(),
                    actual: "<unknown digest algorithm>".to_string(),
                });
                continue;
            };

            match actual_digest(entry, algorithm) {
                Some(actual) => {
                    if !actual.eq_ignore_ascii_case(&entry.digest) {
                        result.valid = false;
                        result.mismatched.push(MismatchedFile {
                            path,
                            expected: entry.digest.clone(),
                            actual,
                        });
                    }
                }
                None => {
                    result.valid = false;
                    result.missing.push(path);
                }
            }
        }

        result
    }
}

/// Result of manifest verification
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Whether all verifications passed
    pub valid: bool,
    /// Files with mismatched checksums
    pub mismatched: Vec<MismatchedFile>,
    /// Files that are missing
    pub missing: Vec<String>,
}

/// A file with a mismatched checksum
#[derive(Debug, Clone)]
pub struct MismatchedFile {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Combined `metadata.json` written in [`ManifestStyle::Simple`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub arch: String,
    /// Chart archive file name
    pub charts: String,
    pub images: Vec<ImageReference>,
}

impl BundleMetadata {
    /// Write to `path` as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Stream `reader` through hash `D`, returning lowercase hex
pub(crate) fn hash_reader<D: Digest>(mut reader: impl Read) -> Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes() {
        assert_eq!(
            DigestAlgorithm::Md5.hash_bytes(b"hello"),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            DigestAlgorithm::Sha256.hash_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        std::fs::write(&path, b"chart bytes").unwrap();

        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            assert_eq!(
                algorithm.hash_file(&path).unwrap(),
                algorithm.hash_bytes(b"chart bytes")
            );
        }
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            DigestAlgorithm::detect("5d41402abc4b2a76b9719d911017c592"),
            Some(DigestAlgorithm::Md5)
        );
        assert_eq!(DigestAlgorithm::detect("abc"), None);
    }

    #[test]
    fn test_generate_skips_missing_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("charts.tgz"), b"chart").unwrap();

        let manifest = Manifest::generate(
            temp.path(),
            "v1.0.0/amd64",
            &["charts.tgz", "images.tar.gz"],
            DigestAlgorithm::Md5,
        )
        .unwrap();

        assert_eq!(manifest.entries.len(), 1);
        let entry = &manifest.entries[0];
        assert_eq!(entry.name, "charts.tgz");
        assert_eq!(entry.path, "v1.0.0/amd64");
        assert_eq!(entry.digest, DigestAlgorithm::Md5.hash_bytes(b"chart"));
        assert_eq!(entry.relative_path(), "v1.0.0/amd64/charts.tgz");
    }

    #[test]
    fn test_json_shape() {
        let manifest = Manifest {
            entries: vec![ManifestEntry {
                name: "charts.tgz".to_string(),
                digest: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
                path: "v1/arm64".to_string(),
            }],
        };
        let json: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "charts.tgz", "digest": "d41d8cd98f00b204e9800998ecf8427e", "path": "v1/arm64"}
            ])
        );

        let parsed = Manifest::parse(manifest.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_verification() {
        let manifest = Manifest {
            entries: vec![
                ManifestEntry {
                    name: "charts.tgz".to_string(),
                    digest: DigestAlgorithm::Md5.hash_bytes(b"chart"),
                    path: "v1/amd64".to_string(),
                },
                ManifestEntry {
                    name: "images.tar.gz".to_string(),
                    digest: DigestAlgorithm::Sha256.hash_bytes(b"images"),
                    path: "v1/amd64".to_string(),
                },
            ],
        };

        let ok = manifest.verify_files(|path| match path {
            "v1/amd64/charts.tgz" => Ok(b"chart".to_vec()),
            "v1/amd64/images.tar.gz" => Ok(b"images".to_vec()),
            _ => Err(std::io::ErrorKind::NotFound.into()),
        });
        assert!(ok.valid);

        let bad = manifest.verify_files(|path| match path {
            "v1/amd64/charts.tgz" => Ok(b"tampered".to_vec()),
            _ => Err(std::io::ErrorKind::NotFound.into()),
        });
        assert!(!bad.valid);
        assert_eq!(bad.mismatched.len(), 1);
        assert_eq!(bad.mismatched[0].path, "v1/amd64/charts.tgz");
        assert_eq!(bad.missing, vec!["v1/amd64/images.tar.gz".to_string()]);
    }

    #[test]
    fn test_style_and_algorithm_parsing() {
        assert_eq!("simple".parse::<ManifestStyle>().unwrap(), ManifestStyle::Simple);
        assert_eq!(
            "digest-manifest".parse::<ManifestStyle>().unwrap(),
            ManifestStyle::Digest
        );
        assert!("xml".parse::<ManifestStyle>().is_err());
        assert_eq!("SHA256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }
}
