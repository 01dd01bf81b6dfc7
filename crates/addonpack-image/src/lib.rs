//! Addonpack Image - local image store access
//!
//! - [`ImageBackend`]: capability interface over `nerdctl`, `docker` and `ctr`
//! - [`image_exists`]: presence probe that never fails
//! - [`acquire`]: bounded parallel pulls with a partial-failure policy
//! - [`export`]: save and gzip the bundle's image archive
//! - [`MockBackend`]: in-memory backend for tests

pub mod acquire;
pub mod backend;
pub mod error;
pub mod export;
pub mod mock;
pub mod probe;

pub use acquire::{AcquireOptions, NoopObserver, PullObserver, PullOutcome, PullReport, acquire};
pub use backend::{ImageBackend, ToolBackend, create_backend};
pub use error::{ImageError, Result};
pub use export::export;
pub use mock::{MockBackend, OperationCounts};
pub use probe::image_exists;
