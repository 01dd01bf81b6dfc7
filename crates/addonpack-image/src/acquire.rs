//! Bounded parallel image acquisition
//!
//! Presence probes and pulls each run at most `max_parallel` at a time.
//! Images already present are never pulled. Under fail-fast the semaphore is closed by the first failing pull,
//! so no further pull starts; pulls already running are drained before the
//! error is returned.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

use addonpack_core::ImageReference;

use crate::backend::ImageBackend;
use crate::error::{ImageError, Result};
use crate::probe::image_exists;

/// How acquisition treats concurrency and failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Maximum concurrent pulls; values below 1 are treated as 1
    pub max_parallel: usize,
    /// Record pull failures instead of aborting
    pub ignore_errors: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            max_parallel: addonpack_core::request::DEFAULT_PARALLEL,
            ignore_errors: false,
        }
    }
}

/// What happened to one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    AlreadyPresent,
    Pulled,
    Failed(String),
}

impl PullOutcome {
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, PullOutcome::Failed(_))
    }
}

/// Per-image outcomes in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub outcomes: Vec<(ImageReference, PullOutcome)>,
}

impl PullReport {
    /// Images that can be exported, in input order
    pub fn available(&self) -> Vec<ImageReference> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_available())
            .map(|(image, _)| image.clone())
            .collect()
    }

    /// Failed images with their reasons
    pub fn failures(&self) -> Vec<(&ImageReference, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(image, outcome)| match outcome {
                PullOutcome::Failed(reason) => Some((image, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn pulled_count(&self) -> usize {
        self.count(|o| matches!(o, PullOutcome::Pulled))
    }

    pub fn present_count(&self) -> usize {
        self.count(|o| matches!(o, PullOutcome::AlreadyPresent))
    }

    fn count(&self, pred: impl Fn(&PullOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Receives progress from the acquisition loop
pub trait PullObserver: Send + Sync {
    /// `total` images are about to be pulled
    fn on_start(&self, _total: usize) {}

    /// One pull finished
    fn on_complete(&self, _image: &ImageReference, _outcome: &PullOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PullObserver for NoopObserver {}

/// Ensure every image is available locally.
///
/// Returns [`ImageError::PullFailed`] for the first failing image unless
/// `options.ignore_errors` is set, in which case failures are recorded in
/// the report and every other image is still attempted.
pub async fn acquire(
    backend: Arc<dyn ImageBackend>,
    images: &[ImageReference],
    options: AcquireOptions,
    observer: &dyn PullObserver,
) -> Result<PullReport> {
    let limit = options.max_parallel.max(1);
    let presence: Vec<bool> = stream::iter(images)
        .map(|image| image_exists(backend.as_ref(), image))
        .buffered(limit)
        .collect()
        .await;

    let mut outcomes: HashMap<ImageReference, PullOutcome> = HashMap::new();
    let mut missing = Vec::new();
    for (image, present) in images.iter().zip(presence) {
        if present {
            tracing::debug!(image = %image, "image already present");
            outcomes.insert(image.clone(), PullOutcome::AlreadyPresent);
        } else if !missing.contains(image) {
            missing.push(image.clone());
        }
    }

    if missing.is_empty() {
        tracing::info!(count = images.len(), "all images already present");
        return Ok(ordered_report(images, outcomes));
    }

    tracing::info!(count = missing.len(), parallel = limit, backend = backend.name(), "pulling images");
    observer.on_start(missing.len());

    let permits = Arc::new(Semaphore::new(limit));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for image in missing.iter().cloned() {
        let permits = Arc::clone(&permits);
        let backend = Arc::clone(&backend);
        let tx = tx.clone();
        let fail_fast = !options.ignore_errors;
        tokio::spawn(async move {
            // closed semaphore: an earlier pull failed, do not start
            let Ok(_permit) = permits.acquire().await else {
                return;
            };
            let result = backend.pull(&image).await;
            if result.is_err() && fail_fast {
                permits.close();
            }
            let _ = tx.send((image, result));
        });
    }
    drop(tx);

    let mut fatal = None;
    while let Some((image, result)) = rx.recv().await {
        let outcome = match result {
            Ok(()) => {
                tracing::debug!(image = %image, "pulled");
                PullOutcome::Pulled
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(image = %image, reason = %reason, "pull failed");
                if fatal.is_none() && !options.ignore_errors {
                    fatal = Some(ImageError::PullFailed {
                        image: image.clone(),
                        reason: reason.clone(),
                    });
                }
                PullOutcome::Failed(reason)
            }
        };
        observer.on_complete(&image, &outcome);
        outcomes.insert(image, outcome);
    }

    if let Some(err) = fatal {
        return Err(err);
    }

    // a pull task that panicked never reported back
    for image in missing {
        if outcomes.contains_key(&image) {
            continue;
        }
        let reason = "pull task did not complete".to_string();
        tracing::warn!(image = %image, "pull task ended without a result");
        if !options.ignore_errors {
            return Err(ImageError::PullFailed { image, reason });
        }
        outcomes.insert(image, PullOutcome::Failed(reason));
    }

    Ok(ordered_report(images, outcomes))
}

fn ordered_report(
    images: &[ImageReference],
    mut outcomes: HashMap<ImageReference, PullOutcome>,
) -> PullReport {
    let outcomes = images
        .iter()
        .filter_map(|image| outcomes.remove(image).map(|o| (image.clone(), o)))
        .collect();
    PullReport { outcomes }
}
