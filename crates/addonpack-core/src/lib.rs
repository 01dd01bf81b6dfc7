//! Addonpack Core - Core types for packaging cluster addons
//!
//! This crate provides the pieces of an addon bundle that need no external
//! tools:
//! - `ImageReference` and `extract`: image discovery in rendered charts
//! - `BundleLayout`: the `<name>/<version>/<arch>` directory tree
//! - `Manifest`: per-artifact digests consumed by the provisioner
//! - `archive`: reproducible tarballs and bundle verification
//! - `PackagingRequest` / `PackagerConfig`: run inputs and file defaults

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod image;
pub mod layout;
pub mod manifest;
pub mod request;
pub mod values;

pub use archive::{
    ArchiveEntry, BundleVerification, archive_dir, gzip_file, list_archive,
    read_bundle_manifests, read_file_from_archive, top_level_entries, verify_bundle,
};
pub use config::PackagerConfig;
pub use error::{CoreError, Result};
pub use extract::{Extraction, ExtractionMode, extract, extract_by_pattern, extract_from_text};
pub use image::ImageReference;
pub use layout::{AddonCoordinates, BundleLayout, PathComponent};
pub use manifest::{
    BundleMetadata, DigestAlgorithm, Manifest, ManifestEntry, ManifestStyle, VerificationResult,
};
pub use request::{ImageTool, PackagingRequest, default_output_name, safe_filename};
pub use values::resolve_values_file;
