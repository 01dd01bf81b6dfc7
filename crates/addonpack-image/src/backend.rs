//! Image tool backends
//!
//! Every supported tool is driven through its CLI. The three tools differ
//! only in argument shape; containerd's `ctr` additionally scopes every
//! operation to a namespace and has no single-image inspect command.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use addonpack_core::{ImageReference, ImageTool};

use crate::error::{ImageError, Result};

/// Capabilities the packager needs from a local image store
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &str;

    /// Whether `image` is present locally.
    ///
    /// Errors mean the tool could not answer; see [`crate::probe::image_exists`]
    /// for the never-failing form used by the pipeline.
    async fn inspect(&self, image: &ImageReference) -> Result<bool>;

    /// Pull `image` into the local store
    async fn pull(&self, image: &ImageReference) -> Result<()>;

    /// Write all `images` into one uncompressed tar at `output`
    async fn save(&self, images: &[ImageReference], output: &Path) -> Result<()>;
}

/// Backend shelling out to `nerdctl`, `docker` or `ctr`
#[derive(Debug, Clone)]
pub struct ToolBackend {
    tool: ImageTool,
    binary: PathBuf,
    namespace: String,
}

impl ToolBackend {
    /// Use the tool's own name as the executable
    pub fn new(tool: ImageTool, namespace: impl Into<String>) -> Self {
        Self {
            tool,
            binary: PathBuf::from(tool.as_str()),
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn namespace_args(&self) -> Vec<String> {
        if self.tool.is_namespaced() {
            vec!["-n".to_string(), self.namespace.clone()]
        } else {
            Vec::new()
        }
    }

    /// Arguments for the presence check
    pub fn inspect_args(&self, image: &ImageReference) -> Vec<String> {
        let mut args = self.namespace_args();
        match self.tool {
            ImageTool::Nerdctl | ImageTool::Docker => {
                args.extend(["image".into(), "inspect".into(), image.to_string()]);
            }
            ImageTool::Ctr => args.extend(["images".into(), "ls".into(), "-q".into()]),
        }
        args
    }

    pub fn pull_args(&self, image: &ImageReference) -> Vec<String> {
        let mut args = self.namespace_args();
        if self.tool.is_namespaced() {
            args.push("images".to_string());
        }
        args.extend(["pull".to_string(), image.to_string()]);
        args
    }

    pub fn save_args(&self, images: &[ImageReference], output: &Path) -> Vec<String> {
        let mut args = self.namespace_args();
        match self.tool {
            ImageTool::Nerdctl | ImageTool::Docker => {
                args.extend(["save".into(), "-o".into(), output.display().to_string()]);
            }
            ImageTool::Ctr => {
                args.extend([
                    "images".into(),
                    "export".into(),
                    output.display().to_string(),
                ]);
            }
        }
        args.extend(images.iter().map(ToString::to_string));
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn output(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(command = %self.command_line(args), "running image tool");
        tokio::process::Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ImageError::Spawn {
                tool: self.binary.display().to_string(),
                source,
            })
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(ImageError::CommandFailed {
                command: self.command_line(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ImageBackend for ToolBackend {
    fn name(&self) -> &str {
        self.tool.as_str()
    }

    async fn inspect(&self, image: &ImageReference) -> Result<bool> {
        let args = self.inspect_args(image);
        match self.tool {
            ImageTool::Nerdctl | ImageTool::Docker => {
                // non-zero exit is the tool's "no such image"
                Ok(self.output(&args).await?.status.success())
            }
            ImageTool::Ctr => {
                let output = self.run(&args).await?;
                let listing = String::from_utf8_lossy(&output.stdout);
                Ok(listing_contains(&listing, image))
            }
        }
    }

    async fn pull(&self, image: &ImageReference) -> Result<()> {
        self.run(&self.pull_args(image)).await.map(|_| ())
    }

    async fn save(&self, images: &[ImageReference], output: &Path) -> Result<()> {
        self.run(&self.save_args(images, output)).await.map(|_| ())
    }
}

/// Whether a `ctr images ls -q` listing names `image`.
///
/// A line equal to the reference matches, and so does any line containing
/// it, since ctr lists fully qualified names (`docker.io/library/busybox:1.36`
/// for `busybox:1.36`).
pub fn listing_contains(listing: &str, image: &ImageReference) -> bool {
    let wanted = image.as_str();
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .any(|line| line == wanted || line.contains(wanted))
}

/// Create the backend for `tool`
pub fn create_backend(
    tool: ImageTool,
    namespace: &str,
    binary: Option<&Path>,
) -> Arc<dyn ImageBackend> {
    let backend = ToolBackend::new(tool, namespace);
    match binary {
        Some(binary) => Arc::new(backend.with_binary(binary)),
        None => Arc::new(backend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    #[test]
    fn test_nerdctl_and_docker_args() {
        for tool in [ImageTool::Nerdctl, ImageTool::Docker] {
            let backend = ToolBackend::new(tool, "k8s.io");
            let img = image("busybox:1.36");
            assert_eq!(backend.inspect_args(&img), vec!["image", "inspect", "busybox:1.36"]);
            assert_eq!(backend.pull_args(&img), vec!["pull", "busybox:1.36"]);
            assert_eq!(
                backend.save_args(&[img, image("nginx:1.25")], Path::new("/tmp/images.tar")),
                vec!["save", "-o", "/tmp/images.tar", "busybox:1.36", "nginx:1.25"]
            );
        }
    }

    #[test]
    fn test_ctr_args_are_namespaced() {
        let backend = ToolBackend::new(ImageTool::Ctr, "custom");
        let img = image("busybox:1.36");
        assert_eq!(backend.inspect_args(&img), vec!["-n", "custom", "images", "ls", "-q"]);
        assert_eq!(
            backend.pull_args(&img),
            vec!["-n", "custom", "images", "pull", "busybox:1.36"]
        );
        assert_eq!(
            backend.save_args(&[img], Path::new("out.tar")),
            vec!["-n", "custom", "images", "export", "out.tar", "busybox:1.36"]
        );
    }

    #[test]
    fn test_listing_contains() {
        let listing = "docker.io/library/busybox:1.36\nquay.io/cilium/cilium:v1.14.2\n\n";
        assert!(listing_contains(listing, &image("busybox:1.36")));
        assert!(listing_contains(listing, &image("quay.io/cilium/cilium:v1.14.2")));
        assert!(!listing_contains(listing, &image("nginx:1.25")));
        assert!(!listing_contains("", &image("nginx:1.25")));
    }

    #[test]
    fn test_create_backend() {
        let backend = create_backend(ImageTool::Ctr, "k8s.io", None);
        assert_eq!(backend.name(), "ctr");

        let backend = create_backend(ImageTool::Docker, "k8s.io", Some(Path::new("/opt/docker")));
        assert_eq!(backend.name(), "docker");
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let backend =
            ToolBackend::new(ImageTool::Nerdctl, "k8s.io").with_binary("/nonexistent/nerdctl");
        let err = backend.pull(&image("busybox:1.36")).await.unwrap_err();
        assert!(matches!(err, ImageError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_script_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("docker");
        // present: busybox only; pull of "bad" fails; save writes its args
        std::fs::write(
            &script,
            r#"#!/bin/sh
case "$1" in
  image) [ "$3" = "busybox:1.36" ] ;;
  pull) [ "$2" != "bad:1" ] || { echo "manifest unknown" >&2; exit 1; } ;;
  save) shift 2; out="$1"; shift; echo "$@" > "$out" ;;
esac
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend = ToolBackend::new(ImageTool::Docker, "k8s.io").with_binary(&script);
        assert!(backend.inspect(&image("busybox:1.36")).await.unwrap());
        assert!(!backend.inspect(&image("nginx:1.25")).await.unwrap());

        backend.pull(&image("nginx:1.25")).await.unwrap();
        match backend.pull(&image("bad:1")).await.unwrap_err() {
            ImageError::CommandFailed { stderr, .. } => assert_eq!(stderr, "manifest unknown"),
            other => panic!("unexpected error: {}", other),
        }

        let out = temp.path().join("images.tar");
        backend
            .save(&[image("a:1"), image("b:2")], &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a:1 b:2\n");
    }
}
