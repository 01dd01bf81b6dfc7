//! Image export
//!
//! The tool writes an uncompressed tar next to the target, which is then
//! gzipped and removed. An empty image list produces nothing.

use std::path::{Path, PathBuf};

use addonpack_core::{ImageReference, gzip_file};

use crate::backend::ImageBackend;
use crate::error::{ImageError, Result};

/// Uncompressed intermediate for `archive`: `images.tar.gz` -> `images.tar`
pub fn intermediate_path(archive: &Path) -> PathBuf {
    match archive.to_str().and_then(|s| s.strip_suffix(".gz")) {
        Some(stripped) => PathBuf::from(stripped),
        None => {
            let mut name = archive.as_os_str().to_owned();
            name.push(".tar");
            PathBuf::from(name)
        }
    }
}

/// Save `images` into a gzip-compressed tar at `archive`.
///
/// Returns `false` without touching the filesystem when `images` is empty.
/// On failure neither the intermediate tar nor a partial archive is left.
pub async fn export(
    backend: &dyn ImageBackend,
    images: &[ImageReference],
    archive: &Path,
) -> Result<bool> {
    if images.is_empty() {
        tracing::debug!("no images to export");
        return Ok(false);
    }

    let tar_path = intermediate_path(archive);
    tracing::info!(count = images.len(), path = %archive.display(), "exporting images");

    if let Err(e) = backend.save(images, &tar_path).await {
        remove_if_exists(&tar_path);
        return Err(ImageError::Export {
            message: e.to_string(),
        });
    }

    let gz_path = archive.to_path_buf();
    let compressed = tokio::task::spawn_blocking(move || {
        let result = gzip_file(&tar_path, &gz_path);
        remove_if_exists(&tar_path);
        if result.is_err() {
            remove_if_exists(&gz_path);
        }
        result
    })
    .await
    .map_err(|e| ImageError::Export {
        message: format!("compression task failed: {}", e),
    })?;

    compressed?;
    Ok(true)
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn image(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    #[test]
    fn test_intermediate_path() {
        assert_eq!(
            intermediate_path(Path::new("/b/images.tar.gz")),
            PathBuf::from("/b/images.tar")
        );
        assert_eq!(
            intermediate_path(Path::new("images.out")),
            PathBuf::from("images.out.tar")
        );
    }

    #[tokio::test]
    async fn test_empty_list_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let archive = temp.path().join("images.tar.gz");

        assert!(!export(&mock, &[], &archive).await.unwrap());
        assert!(!archive.exists());
        assert_eq!(mock.operation_counts().saves, 0);
    }

    #[tokio::test]
    async fn test_export_gzips_and_removes_tar() {
        let temp = TempDir::new().unwrap();
        let mock = MockBackend::new().with_present(["a:1", "b:2"]);
        let archive = temp.path().join("images.tar.gz");

        assert!(export(&mock, &[image("a:1"), image("b:2")], &archive)
            .await
            .unwrap());
        assert!(!temp.path().join("images.tar").exists());

        let mut content = String::new();
        GzDecoder::new(std::fs::File::open(&archive).unwrap())
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a:1\nb:2\n");
        assert_eq!(mock.saved(), vec![vec![image("a:1"), image("b:2")]]);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let mock = MockBackend::new().with_present(["a:1"]).with_failing_save();
        let archive = temp.path().join("images.tar.gz");

        let err = export(&mock, &[image("a:1")], &archive).await.unwrap_err();
        assert!(matches!(err, ImageError::Export { .. }));
        assert!(!archive.exists());
        assert!(!temp.path().join("images.tar").exists());
    }
}
