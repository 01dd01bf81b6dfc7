//! Inspect command - view bundle contents without extracting

use console::style;
use std::collections::HashMap;
use std::path::Path;

use addonpack_core::{list_archive, read_bundle_manifests, read_file_from_archive, top_level_entries};

use crate::error::{CliError, Result};
use crate::util::{format_size, short_digest};

pub fn run(archive_path: &Path, show_manifest: bool) -> Result<()> {
    if !archive_path.is_file() {
        return Err(CliError::usage(format!(
            "Archive not found: {}",
            archive_path.display()
        )));
    }

    let manifests = read_bundle_manifests(archive_path)?;

    if show_manifest {
        if manifests.is_empty() {
            return Err(CliError::Other {
                message: "Bundle contains no manifest.json".to_string(),
            });
        }
        for path in manifests.keys() {
            let raw = read_file_from_archive(archive_path, path)?;
            println!("# {}", path);
            println!("{}", String::from_utf8_lossy(&raw));
        }
        return Ok(());
    }

    let size = std::fs::metadata(archive_path)?.len();
    println!(
        "{} {} ({})",
        style("Bundle").cyan().bold(),
        archive_path.display(),
        format_size(size)
    );
    let roots = top_level_entries(archive_path)?;
    println!(
        "  {}: {}",
        style("Top level").dim(),
        roots.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    println!();

    // archive path -> recorded digest
    let mut digests: HashMap<String, &str> = HashMap::new();
    for (manifest_path, manifest) in &manifests {
        let addon_dir = manifest_path
            .split('/')
            .next()
            .map(|root| format!("{}/", root))
            .unwrap_or_default();
        for entry in &manifest.entries {
            digests.insert(
                format!("{}{}", addon_dir, entry.relative_path()),
                entry.digest.as_str(),
            );
        }
    }

    println!("{}:", style("Files").bold());
    for entry in list_archive(archive_path)? {
        if entry.is_dir {
            continue;
        }
        let digest = digests
            .get(&entry.path)
            .map(|d| format!("  {}", style(short_digest(d, 12)).dim()))
            .unwrap_or_default();
        println!(
            "  {} ({}){}",
            entry.path,
            format_size(entry.size),
            digest
        );
    }

    Ok(())
}
