//! Verify command - check bundle layout and manifest digests

use console::style;
use std::path::Path;

use addonpack_core::verify_bundle;

use crate::display;
use crate::error::{CliError, Result};

pub fn run(archive_path: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(CliError::usage(format!(
            "Archive not found: {}",
            archive_path.display()
        )));
    }

    println!(
        "{} {}",
        style("Verifying").cyan().bold(),
        archive_path.display()
    );
    println!();

    let verification = verify_bundle(archive_path)?;
    let roots = verification.roots.iter().cloned().collect::<Vec<_>>().join(", ");

    println!("{}:", style("Layout").bold());
    if verification.has_single_root() {
        println!(
            "  {} Single top-level directory: {}",
            style("[OK]").green().bold(),
            roots
        );
    } else {
        println!(
            "  {} Expected one named top-level directory, found: {}",
            style("[FAIL]").red().bold(),
            if roots.is_empty() { "(empty)" } else { roots.as_str() }
        );
    }
    println!();

    if verification.manifests.is_empty() {
        println!(
            "  {} No manifest.json found",
            style("[SKIP]").yellow().bold()
        );
    }
    for (path, result) in &verification.manifests {
        print!("{}", display::verification_lines(path, result));
    }

    if !verification.has_single_root() {
        return Err(CliError::verification("bundle must have a single named top-level directory"));
    }
    if verification.manifests.values().any(|r| !r.valid) {
        return Err(CliError::verification("manifest digests do not match"));
    }
    Ok(())
}
