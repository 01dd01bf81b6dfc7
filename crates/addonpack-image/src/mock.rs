//! Mock image backend for testing
//!
//! Keeps an in-memory image store so pipeline tests run without a container
//! runtime.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use addonpack_core::ImageReference;

use crate::backend::ImageBackend;
use crate::error::{ImageError, Result};

/// In-memory image backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    pull_delay: Duration,
    inspect_delay: Duration,
    broken_inspect: bool,
    failing_save: bool,
}

#[derive(Default)]
struct MockState {
    present: HashSet<String>,
    /// image -> error text returned by `pull`
    failing: HashMap<String, String>,
    counts: OperationCounts,
    pull_attempts: Vec<ImageReference>,
    saved: Vec<Vec<ImageReference>>,
    in_flight: usize,
    inspects_in_flight: usize,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub inspects: usize,
    pub pulls: usize,
    pub saves: usize,
    /// Highest number of pulls observed running at once
    pub max_concurrent_pulls: usize,
    pub max_concurrent_inspects: usize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images already in the local store
    pub fn with_present<I, S>(self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .unwrap()
            .present
            .extend(images.into_iter().map(Into::into));
        self
    }

    /// Make pulls of `image` fail with `reason`
    pub fn with_failing(self, image: &str, reason: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(image.to_string(), reason.to_string());
        self
    }

    /// Hold every pull for `delay` so overlaps become observable
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Hold every inspect for `delay`
    pub fn with_inspect_delay(mut self, delay: Duration) -> Self {
        self.inspect_delay = delay;
        self
    }

    /// Make every inspect fail as if the tool could not run
    pub fn with_broken_inspect(mut self) -> Self {
        self.broken_inspect = true;
        self
    }

    /// Make `save` fail
    pub fn with_failing_save(mut self) -> Self {
        self.failing_save = true;
        self
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.state.lock().unwrap().counts.clone()
    }

    /// Images whose pull was started, in start order
    pub fn pull_attempts(&self) -> Vec<ImageReference> {
        self.state.lock().unwrap().pull_attempts.clone()
    }

    /// Image lists passed to `save`, one per call
    pub fn saved(&self) -> Vec<Vec<ImageReference>> {
        self.state.lock().unwrap().saved.clone()
    }

    fn failure(tool_args: String, reason: String) -> ImageError {
        ImageError::CommandFailed {
            command: format!("mock {}", tool_args),
            status: "exit status: 1".to_string(),
            stderr: reason,
        }
    }
}

#[async_trait]
impl ImageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn inspect(&self, image: &ImageReference) -> Result<bool> {
        {
            let mut state = self.state.lock().unwrap();
            state.counts.inspects += 1;
            state.inspects_in_flight += 1;
            state.counts.max_concurrent_inspects =
                state.counts.max_concurrent_inspects.max(state.inspects_in_flight);
        }

        if !self.inspect_delay.is_zero() {
            tokio::time::sleep(self.inspect_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.inspects_in_flight -= 1;
        if self.broken_inspect {
            return Err(Self::failure(
                format!("image inspect {}", image),
                "cannot connect to daemon".to_string(),
            ));
        }
        Ok(state.present.contains(image.as_str()))
    }

    async fn pull(&self, image: &ImageReference) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.counts.pulls += 1;
            state.pull_attempts.push(image.clone());
            state.in_flight += 1;
            state.counts.max_concurrent_pulls =
                state.counts.max_concurrent_pulls.max(state.in_flight);
        }

        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        if let Some(reason) = state.failing.get(image.as_str()).cloned() {
            return Err(Self::failure(format!("pull {}", image), reason));
        }
        state.present.insert(image.to_string());
        Ok(())
    }

    async fn save(&self, images: &[ImageReference], output: &Path) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.counts.saves += 1;
            state.saved.push(images.to_vec());
            if self.failing_save {
                return Err(Self::failure(
                    "save".to_string(),
                    "no space left on device".to_string(),
                ));
            }
            if let Some(missing) = images.iter().find(|i| !state.present.contains(i.as_str())) {
                return Err(Self::failure(
                    format!("save {}", missing),
                    format!("image {} not found", missing),
                ));
            }
        }

        let body: String = images.iter().map(|i| format!("{}\n", i)).collect();
        tokio::fs::write(output, body).await?;
        Ok(())
    }
}
