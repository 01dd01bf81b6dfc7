//! Archive creation and inspection for addon bundles
//!
//! Archives are written reproducibly: entries in sorted order, mtime 0,
//! numeric owner 0 and fixed modes. Packaging the same chart twice gives a
//! byte-identical `charts.tgz`.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use md5::Md5;
use sha2::Sha256;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path};
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::layout::PathComponent;
use crate::manifest::{
    DigestAlgorithm, MANIFEST_FILE, Manifest, VerificationResult, hash_reader,
};

/// Archive `src_dir` as a `.tar.gz` whose only top-level entry is `root_name`.
///
/// The root is given explicitly rather than derived from the current
/// directory, and is validated as a single path component.
pub fn archive_dir(src_dir: &Path, dst: &Path, root_name: &str) -> Result<()> {
    let root = PathComponent::new("archive root", root_name).map_err(|e| CoreError::Archive {
        message: e.to_string(),
    })?;

    let file = File::create(dst)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Archive {
            message: format!("Failed to walk {}: {}", src_dir.display(), e),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?;
        let archive_path = archive_path_for(root.as_str(), rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let mut header = base_header(EntryType::Directory, 0o755);
            header.set_size(0);
            builder.append_data(&mut header, &archive_path, io::empty())?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            let mut header = base_header(EntryType::Symlink, 0o777);
            header.set_size(0);
            builder.append_link(&mut header, &archive_path, &target)?;
        } else {
            let metadata = entry.metadata().map_err(|e| CoreError::Archive {
                message: e.to_string(),
            })?;
            let mut header = base_header(EntryType::Regular, file_mode(&metadata));
            header.set_size(metadata.len());
            let file = File::open(entry.path())?;
            builder.append_data(&mut header, &archive_path, BufReader::new(file))?;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Gzip `src` into `dst`, streaming
pub fn gzip_file(src: &Path, dst: &Path) -> Result<()> {
    let mut input = BufReader::new(File::open(src)?);
    let output = BufWriter::new(File::create(dst)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Information about a file in an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Relative path within the archive
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
}

/// List entries of a `.tar.gz`
pub fn list_archive(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = open_archive(archive_path)?;
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let size = entry.header().size()?;
        let is_dir = entry.header().entry_type().is_dir();

        entries.push(ArchiveEntry { path, size, is_dir });
    }

    Ok(entries)
}

/// Distinct first path components of an archive's entries
pub fn top_level_entries(archive_path: &Path) -> Result<BTreeSet<String>> {
    let mut archive = open_archive(archive_path)?;
    let mut roots = BTreeSet::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?;
        if let Some(first) = path.components().next() {
            roots.insert(component_name(first));
        }
    }

    Ok(roots)
}

/// Read a specific file from an archive
pub fn read_file_from_archive(archive_path: &Path, file_path: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(archive_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        if path == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", file_path),
    })
}

/// Manifests found in a bundle, keyed by their archive path
pub fn read_bundle_manifests(archive_path: &Path) -> Result<BTreeMap<String, Manifest>> {
    let mut archive = open_archive(archive_path)?;
    let mut manifests = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        if path.rsplit('/').next() != Some(MANIFEST_FILE) {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        let manifest = Manifest::parse(&content).map_err(|e| CoreError::InvalidManifest {
            message: format!("{}: {}", path, e),
        })?;
        manifests.insert(path, manifest);
    }

    Ok(manifests)
}

/// Result of verifying a whole bundle archive
#[derive(Debug, Clone)]
pub struct BundleVerification {
    /// Top-level entry names found in the archive
    pub roots: BTreeSet<String>,
    /// Per-manifest results, keyed by manifest archive path
    pub manifests: BTreeMap<String, VerificationResult>,
}

impl BundleVerification {
    /// The archive has exactly one real top-level directory
    #[must_use]
    pub fn has_single_root(&self) -> bool {
        self.roots.len() == 1
            && self
                .roots
                .iter()
                .all(|root| !root.is_empty() && root != "." && root != "..")
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.has_single_root()
            && !self.manifests.is_empty()
            && self.manifests.values().all(|r| r.valid)
    }
}

/// Check the top-level layout and re-hash every file listed in every
/// `manifest.json` of a bundle.
///
/// Two passes: the first collects manifests, the second streams only the
/// listed artifacts through their digest, so image archives are never held
/// in memory.
pub fn verify_bundle(archive_path: &Path) -> Result<BundleVerification> {
    let roots = top_level_entries(archive_path)?;
    let manifests = read_bundle_manifests(archive_path)?;

    // archive path -> algorithm for every listed artifact
    let mut wanted: HashMap<String, DigestAlgorithm> = HashMap::new();
    for (manifest_path, manifest) in &manifests {
        let addon_dir = addon_dir_of(manifest_path);
        for entry in &manifest.entries {
            if let Some(algorithm) = DigestAlgorithm::detect(&entry.digest) {
                wanted.insert(format!("{}{}", addon_dir, entry.relative_path()), algorithm);
            }
        }
    }

    let mut actual: HashMap<String, String> = HashMap::new();
    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().to_string();
        let Some(algorithm) = wanted.get(&path).copied() else {
            continue;
        };
        let digest = match algorithm {
            DigestAlgorithm::Md5 => hash_reader::<Md5>(entry)?,
            DigestAlgorithm::Sha256 => hash_reader::<Sha256>(entry)?,
        };
        actual.insert(path, digest);
    }

    let results = manifests
        .iter()
        .map(|(manifest_path, manifest)| {
            let addon_dir = addon_dir_of(manifest_path);
            let result = manifest.verify_with(|entry, _| {
                actual
                    .get(&format!("{}{}", addon_dir, entry.relative_path()))
                    .cloned()
            });
            (manifest_path.clone(), result)
        })
        .collect();

    Ok(BundleVerification {
        roots,
        manifests: results,
    })
}

fn open_archive(archive_path: &Path) -> Result<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive_path)?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

/// `<addon>/<version>/<arch>/manifest.json` -> `<addon>/`
fn addon_dir_of(manifest_path: &str) -> String {
    let parts: Vec<&str> = manifest_path.split('/').collect();
    if parts.len() >= 4 {
        format!("{}/", parts[..parts.len() - 3].join("/"))
    } else {
        String::new()
    }
}

fn archive_path_for(root: &str, rel: &Path) -> String {
    let mut path = root.to_string();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            path.push('/');
            path.push_str(&part.to_string_lossy());
        }
    }
    path
}

fn component_name(component: Component<'_>) -> String {
    match component {
        Component::Normal(part) => part.to_string_lossy().to_string(),
        Component::CurDir => ".".to_string(),
        Component::ParentDir => "..".to_string(),
        Component::RootDir | Component::Prefix(_) => "/".to_string(),
    }
}

fn base_header(entry_type: EntryType, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}
