//! Bundle assembly pipeline
//!
//! One packaging run moves strictly forward through [`Stage`]s. All
//! intermediate files live in a private scratch directory that is removed
//! when the run ends, successfully or not. The output archive appears only
//! once it is complete.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use addonpack_core::layout::{CHARTS_ARCHIVE, IMAGES_ARCHIVE, IMAGES_LIST};
use addonpack_core::{
    BundleLayout, BundleMetadata, Extraction, ExtractionMode, ImageReference, Manifest,
    ManifestStyle, PackagingRequest, archive_dir, extract_from_text, resolve_values_file,
};
use addonpack_engine::ChartRenderer;
use addonpack_image::{
    AcquireOptions, ImageBackend, NoopObserver, PullObserver, PullReport, acquire, export,
};

use crate::error::{BundleError, Result};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    RenderChart,
    ExtractImages,
    AcquireImages,
    ExportImages,
    WriteManifest,
    AssembleFinalArchive,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::RenderChart => "render chart",
            Stage::ExtractImages => "extract images",
            Stage::AcquireImages => "acquire images",
            Stage::ExportImages => "export images",
            Stage::WriteManifest => "write manifest",
            Stage::AssembleFinalArchive => "assemble archive",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful packaging run
#[derive(Debug, Clone)]
pub struct PackagingReport {
    /// Final archive
    pub output: PathBuf,
    /// Values file used for rendering, if any
    pub values_file: Option<PathBuf>,
    /// Discovered images, in first-seen order
    pub images: Vec<ImageReference>,
    pub extraction_mode: ExtractionMode,
    /// `None` when pulling was disabled or there was nothing to pull
    pub pulls: Option<PullReport>,
    /// Images written into the image archive
    pub exported: Vec<ImageReference>,
    /// Archive paths of the bundle's artifacts
    pub entries: Vec<String>,
    /// Non-fatal problems the operator should see
    pub warnings: Vec<String>,
}

/// Rendered chart plus the images found in it
#[derive(Debug, Clone)]
pub struct Discovery {
    pub values_file: Option<PathBuf>,
    pub extraction: Extraction,
}

/// Drives one packaging run against a renderer and an image backend
pub struct Assembler {
    renderer: Arc<dyn ChartRenderer>,
    backend: Arc<dyn ImageBackend>,
    observer: Arc<dyn PullObserver>,
}

impl Assembler {
    pub fn new(renderer: Arc<dyn ChartRenderer>, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            renderer,
            backend,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report pull progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PullObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Render the chart and extract its images without packaging anything
    pub async fn discover(&self, request: &PackagingRequest) -> Result<Discovery> {
        request.validate()?;
        discover(
            self.renderer.as_ref(),
            &request.chart_path,
            request.values.as_deref(),
            &request.helm_args,
        )
        .await
    }

    /// Build the bundle described by `request`.
    ///
    /// On failure the scratch directory is removed and no output archive is
    /// left behind.
    pub async fn package(&self, request: &PackagingRequest) -> Result<PackagingReport> {
        let mut stage = Stage::Init;
        match self.run(request, &mut stage).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(stage = %stage, error = %e, "packaging failed");
                Err(e)
            }
        }
    }

    async fn run(&self, request: &PackagingRequest, stage: &mut Stage) -> Result<PackagingReport> {
        enter(stage, Stage::Init);
        request.validate()?;
        let chart_root = request.chart_dir_name()?;
        let scratch = tempfile::Builder::new()
            .prefix("addonpack-")
            .tempdir()
            .map_err(|e| BundleError::filesystem("creating scratch directory", e))?;
        let layout = BundleLayout::new(scratch.path(), &request.addon);
        layout.create()?;
        let mut warnings = Vec::new();

        enter(stage, Stage::RenderChart);
        let values_file = resolve_values_file(&request.chart_path, request.values.as_deref());
        tracing::info!(
            chart = %request.chart_path.display(),
            values = ?values_file,
            "rendering chart"
        );
        let rendered = self
            .renderer
            .render(&request.chart_path, values_file.as_deref(), &request.helm_args)
            .await?;
        {
            let chart = request.chart_path.clone();
            let dst = layout.charts_archive();
            blocking(move || archive_dir(&chart, &dst, &chart_root)).await?;
        }

        enter(stage, Stage::ExtractImages);
        let extraction = extract_from_text(&rendered);
        if extraction.is_degraded() {
            warnings.push(
                "some rendered documents could not be parsed as YAML; their images were found \
                 by line scan and mapping-form image specs in them may be missing"
                    .to_string(),
            );
        }
        let images = extraction.images;
        tracing::info!(count = images.len(), "discovered images");
        write_images_list(&layout.images_list(), &images)?;

        enter(stage, Stage::AcquireImages);
        let pulls = if request.pull && !images.is_empty() {
            let options = AcquireOptions {
                max_parallel: request.parallel,
                ignore_errors: request.ignore_pull_errors,
            };
            let report = acquire(
                Arc::clone(&self.backend),
                &images,
                options,
                self.observer.as_ref(),
            )
            .await?;
            for (image, reason) in report.failures() {
                warnings.push(format!("pull failed for {}: {}", image, reason));
            }
            Some(report)
        } else {
            tracing::debug!(pull = request.pull, "skipping pulls");
            None
        };

        enter(stage, Stage::ExportImages);
        let exportable = match &pulls {
            Some(report) => report.available(),
            None => images.clone(),
        };
        let exported = if export(self.backend.as_ref(), &exportable, &layout.images_archive()).await? {
            exportable
        } else {
            Vec::new()
        };

        enter(stage, Stage::WriteManifest);
        write_metadata(request, &layout, &images)?;

        enter(stage, Stage::AssembleFinalArchive);
        let staged = scratch.path().join("bundle.tar.gz");
        {
            let src = layout.addon_dir();
            let dst = staged.clone();
            let root = layout.top_level_name().to_string();
            blocking(move || archive_dir(&src, &dst, &root)).await?;
        }
        publish(&staged, &request.output)?;
        let entries = layout.entry_paths(request.manifest_style);

        enter(stage, Stage::Done);
        tracing::info!(output = %request.output.display(), "bundle created");
        Ok(PackagingReport {
            output: request.output.clone(),
            values_file,
            images,
            extraction_mode: extraction.mode,
            pulls,
            exported,
            entries,
            warnings,
        })
    }
}

/// Render `chart` and extract its images.
///
/// Needs no image tool; backs the dry-run listing.
pub async fn discover(
    renderer: &dyn ChartRenderer,
    chart: &Path,
    values: Option<&Path>,
    helm_args: &[String],
) -> Result<Discovery> {
    if !chart.is_dir() {
        return Err(BundleError::InvalidRequest {
            message: format!("Chart not found: {}", chart.display()),
        });
    }
    let values_file = resolve_values_file(chart, values);
    let rendered = renderer
        .render(chart, values_file.as_deref(), helm_args)
        .await?;
    Ok(Discovery {
        values_file,
        extraction: extract_from_text(&rendered),
    })
}

fn enter(current: &mut Stage, next: Stage) {
    tracing::debug!(from = %current, to = %next, "stage transition");
    *current = next;
}

/// Run filesystem-heavy work off the async runtime
async fn blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> addonpack_core::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BundleError::filesystem("archive task failed", e))??;
    Ok(())
}

/// One reference per line, no trailing newline
fn write_images_list(path: &Path, images: &[ImageReference]) -> Result<()> {
    let body = images
        .iter()
        .map(ImageReference::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(path, body).map_err(|e| BundleError::filesystem(IMAGES_LIST, e))
}

/// `images` is the discovered list, matching `images.list`
fn write_metadata(
    request: &PackagingRequest,
    layout: &BundleLayout,
    images: &[ImageReference],
) -> Result<()> {
    let path = layout.metadata_file(request.manifest_style);
    match request.manifest_style {
        ManifestStyle::Digest => {
            let manifest = Manifest::generate(
                &layout.arch_dir(),
                &request.addon.rel_path(),
                &[CHARTS_ARCHIVE, IMAGES_ARCHIVE],
                request.digest_algorithm,
            )?;
            manifest.write(&path)?;
        }
        ManifestStyle::Simple => {
            let addon = &request.addon;
            BundleMetadata {
                name: addon.name.to_string(),
                kind: addon.kind.clone(),
                version: addon.version.to_string(),
                arch: addon.arch.to_string(),
                charts: CHARTS_ARCHIVE.to_string(),
                images: images.to_vec(),
            }
            .write(&path)?;
        }
    }
    tracing::debug!(path = %path.display(), "wrote bundle metadata");
    Ok(())
}

/// Move the finished archive into place; copy when rename crosses devices
fn publish(staged: &Path, output: &Path) -> Result<()> {
    if std::fs::rename(staged, output).is_ok() {
        return Ok(());
    }
    if let Err(e) = std::fs::copy(staged, output) {
        let _ = std::fs::remove_file(output);
        return Err(BundleError::filesystem(
            &format!("writing {}", output.display()),
            e,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Init < Stage::RenderChart);
        assert!(Stage::ExportImages < Stage::WriteManifest);
        assert!(Stage::AssembleFinalArchive < Stage::Done);
        assert_eq!(Stage::AcquireImages.to_string(), "acquire images");
    }

    #[test]
    fn test_images_list_has_no_trailing_newline() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(IMAGES_LIST);
        let images = vec![
            ImageReference::parse("a:1").unwrap(),
            ImageReference::parse("b:2").unwrap(),
        ];
        write_images_list(&path, &images).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a:1\nb:2");

        write_images_list(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_publish_into_missing_directory_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("bundle.tar.gz");
        std::fs::write(&staged, b"data").unwrap();
        let output = temp.path().join("missing").join("out.tar.gz");

        assert!(matches!(
            publish(&staged, &output),
            Err(BundleError::Filesystem { .. })
        ));
        assert!(!output.exists());
    }
}
