//! Addonpack Bundle - assembles offline addon bundles
//!
//! [`Assembler`] renders a chart, collects its images, makes them available
//! locally, exports them and writes a `<name>/<version>/<arch>` tree into a
//! single `.tar.gz` rooted at the addon name.

pub mod assembler;
pub mod error;

pub use assembler::{Assembler, Discovery, PackagingReport, Stage, discover};
pub use error::{BundleError, Result};
