//! Display formatting for command output

use console::style;
use std::fmt::Write;

use addonpack_bundle::PackagingReport;
use addonpack_core::{ImageReference, VerificationResult};
use addonpack_image::PullOutcome;

use crate::util::{format_size, short_digest};

/// Summary printed after a successful `package`
pub fn package_summary(report: &PackagingReport, size: Option<u64>) -> String {
    let mut out = String::new();

    let size = size.map(|s| format!(" ({})", format_size(s))).unwrap_or_default();
    let _ = writeln!(
        out,
        "  {} {}{}",
        style("Created").green().bold(),
        report.output.display(),
        size
    );
    let values = report
        .values_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let _ = writeln!(out, "  {} {}", style("Values").dim(), values);
    let _ = writeln!(out);

    let _ = writeln!(out, "{} ({}):", style("Images").bold(), report.images.len());
    for image in &report.images {
        let _ = writeln!(out, "  {}{}", image, image_status(report, image));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}:", style("Layout").bold());
    for entry in &report.entries {
        let _ = writeln!(out, "  {}", entry);
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", style("Warnings").yellow().bold());
        for warning in &report.warnings {
            let _ = writeln!(out, "  {} {}", style("!").yellow(), warning);
        }
    }

    out
}

fn image_status(report: &PackagingReport, image: &ImageReference) -> String {
    let outcome = report
        .pulls
        .as_ref()
        .and_then(|pulls| pulls.outcomes.iter().find(|(i, _)| i == image))
        .map(|(_, outcome)| outcome);

    match outcome {
        Some(PullOutcome::AlreadyPresent) => format!(" {}", style("[present]").dim()),
        Some(PullOutcome::Pulled) => format!(" {}", style("[pulled]").green()),
        Some(PullOutcome::Failed(_)) => format!(" {}", style("[failed, not bundled]").red()),
        None => String::new(),
    }
}

/// Per-manifest verification lines
pub fn verification_lines(manifest_path: &str, result: &VerificationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}):", style("Integrity").bold(), manifest_path);

    if result.valid {
        let _ = writeln!(out, "  {} All file digests match", style("[OK]").green().bold());
        return out;
    }

    let _ = writeln!(out, "  {} Digest verification failed", style("[FAIL]").red().bold());
    for mismatch in &result.mismatched {
        let _ = writeln!(
            out,
            "    {} {}: expected {}, got {}",
            style("-").red(),
            mismatch.path,
            short_digest(&mismatch.expected, 16),
            short_digest(&mismatch.actual, 16)
        );
    }
    for missing in &result.missing {
        let _ = writeln!(out, "    {} {}: missing from archive", style("-").red(), missing);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use addonpack_core::ExtractionMode;
    use addonpack_core::manifest::MismatchedFile;
    use addonpack_image::PullReport;
    use std::path::PathBuf;

    fn image(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    fn report() -> PackagingReport {
        PackagingReport {
            output: PathBuf::from("cilium-v1.14.2-amd64.tar.gz"),
            values_file: None,
            images: vec![image("a:1"), image("b:1")],
            extraction_mode: ExtractionMode::Structured,
            pulls: Some(PullReport {
                outcomes: vec![
                    (image("a:1"), PullOutcome::AlreadyPresent),
                    (image("b:1"), PullOutcome::Failed("denied".to_string())),
                ],
            }),
            exported: vec![image("a:1")],
            entries: vec![
                "cilium/v1.14.2/amd64/charts.tgz".to_string(),
                "cilium/v1.14.2/amd64/images.tar.gz".to_string(),
                "cilium/v1.14.2/amd64/manifest.json".to_string(),
            ],
            warnings: vec!["pull failed for b:1: denied".to_string()],
        }
    }

    #[test]
    fn test_package_summary() {
        console::set_colors_enabled(false);
        let text = package_summary(&report(), Some(2048));
        let expected = [
            "  Created cilium-v1.14.2-amd64.tar.gz (2.0 KiB)",
            "  Values (none)",
            "",
            "Images (2):",
            "  a:1 [present]",
            "  b:1 [failed, not bundled]",
            "",
            "Layout:",
            "  cilium/v1.14.2/amd64/charts.tgz",
            "  cilium/v1.14.2/amd64/images.tar.gz",
            "  cilium/v1.14.2/amd64/manifest.json",
            "",
            "Warnings:",
            "  ! pull failed for b:1: denied",
            "",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_summary_without_pulls_has_no_status() {
        console::set_colors_enabled(false);
        let mut report = report();
        report.pulls = None;
        report.warnings.clear();
        let text = package_summary(&report, None);
        assert!(text.contains("  a:1\n"));
        assert!(!text.contains("Warnings"));
    }

    #[test]
    fn test_verification_lines() {
        console::set_colors_enabled(false);
        let result = VerificationResult {
            valid: false,
            mismatched: vec![MismatchedFile {
                path: "v1/amd64/charts.tgz".to_string(),
                expected: "5d41402abc4b2a76b9719d911017c592".to_string(),
                actual: "00000000000000000000000000000000".to_string(),
            }],
            missing: vec!["v1/amd64/images.tar.gz".to_string()],
        };
        let text = verification_lines("x/v1/amd64/manifest.json", &result);
        assert!(text.contains("[FAIL]"));
        assert!(text.contains("v1/amd64/charts.tgz: expected 5d41402abc4b2a76, got 0000000000000000"));
        assert!(text.contains("v1/amd64/images.tar.gz: missing from archive"));
    }
}
