//! Package command - build an addon bundle

use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use addonpack_bundle::Assembler;
use addonpack_core::{AddonCoordinates, PackagerConfig, PackagingRequest};
use addonpack_engine::HelmRenderer;
use addonpack_image::create_backend;

use crate::display;
use crate::error::Result;
use crate::progress::PullProgress;
use crate::{ChartArgs, PackageArgs};

pub async fn run(args: &PackageArgs, config: &PackagerConfig) -> Result<()> {
    let request = build_request(args, config)?;
    let renderer = HelmRenderer::with_binary(helm_binary(&args.chart, config));
    let backend = create_backend(
        request.image_tool,
        &request.namespace,
        request.tool_binary.as_deref(),
    );

    println!(
        "{} {} {} ({}, {})",
        style("Packaging").cyan().bold(),
        request.addon.name,
        request.addon.version,
        request.addon.arch,
        request.image_tool
    );

    let progress = Arc::new(PullProgress::new());
    let result = Assembler::new(Arc::new(renderer), backend)
        .with_observer(progress.clone())
        .package(&request)
        .await;
    progress.finish();
    let report = result?;

    let size = std::fs::metadata(&report.output).map(|m| m.len()).ok();
    print!("{}", display::package_summary(&report, size));
    Ok(())
}

/// helm executable: flag or env, then config, then `helm` on PATH
pub fn helm_binary(chart: &ChartArgs, config: &PackagerConfig) -> PathBuf {
    chart
        .helm_bin
        .clone()
        .or_else(|| config.helm_binary.clone())
        .unwrap_or_else(|| PathBuf::from("helm"))
}

/// Helm arguments from the config file, then from the command line
pub fn helm_args(chart: &ChartArgs, config: &PackagerConfig) -> Vec<String> {
    config
        .helm_args
        .iter()
        .chain(chart.helm_args.iter())
        .cloned()
        .collect()
}

/// Merge flags (and their env vars) over the config file over defaults
pub fn build_request(args: &PackageArgs, config: &PackagerConfig) -> Result<PackagingRequest> {
    let addon = AddonCoordinates::new(&args.name, &args.addon_type, &args.addon_version, &args.arch)?;
    let mut request = PackagingRequest::new(&args.chart.chart_path, addon);

    request.values = args.chart.values.clone();
    if let Some(output) = &args.output {
        request.output = output.clone();
    }
    if let Some(tool) = args.image_tool.or(config.image_tool()?) {
        request.image_tool = tool;
    }
    request.tool_binary = args.tool_binary.clone().or_else(|| config.tool_binary.clone());
    if let Some(parallel) = args.parallel.or(config.parallel) {
        request.parallel = parallel.max(1);
    }
    if let Some(namespace) = args.ctr_namespace.as_ref().or(config.ctr_namespace.as_ref()) {
        request.namespace = namespace.clone();
    }
    request.pull = !args.no_pull;
    request.ignore_pull_errors = args.ignore_pull_errors;
    request.helm_args = helm_args(&args.chart, config);
    if let Some(style) = args.manifest_style.or(config.manifest_style) {
        request.manifest_style = style;
    }
    if let Some(algorithm) = args.digest.or(config.digest_algorithm) {
        request.digest_algorithm = algorithm;
    }

    Ok(request)
}
