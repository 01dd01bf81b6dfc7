//! Addonpack Engine - chart rendering
//!
//! Charts are rendered by an external templating tool. This crate owns the
//! `ChartRenderer` seam, the `helm template` implementation and a fixed-text
//! renderer for tests.

pub mod error;
pub mod renderer;

pub use error::{EngineError, Result};
pub use renderer::{ChartRenderer, HelmRenderer, RenderCall, StaticRenderer};
