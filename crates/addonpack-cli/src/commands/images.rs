//! Images command - list the images a chart would bundle

use console::style;
use serde::Serialize;
use std::path::PathBuf;

use addonpack_bundle::discover;
use addonpack_core::{ImageReference, PackagerConfig};
use addonpack_engine::HelmRenderer;

use super::package::{helm_args, helm_binary};
use crate::ChartArgs;
use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
struct ImagesOutput<'a> {
    chart: &'a PathBuf,
    values: Option<&'a PathBuf>,
    degraded: bool,
    images: &'a [ImageReference],
}

pub async fn run(chart: &ChartArgs, config: &PackagerConfig, json: bool) -> Result<()> {
    let renderer = HelmRenderer::with_binary(helm_binary(chart, config));
    let discovery = discover(
        &renderer,
        &chart.chart_path,
        chart.values.as_deref(),
        &helm_args(chart, config),
    )
    .await?;
    let extraction = &discovery.extraction;

    if json {
        let output = ImagesOutput {
            chart: &chart.chart_path,
            values: discovery.values_file.as_ref(),
            degraded: extraction.is_degraded(),
            images: &extraction.images,
        };
        let text = serde_json::to_string_pretty(&output).map_err(|e| CliError::Other {
            message: e.to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    if extraction.is_degraded() {
        eprintln!(
            "{} some rendered documents are not valid YAML; mapping-form images in them may be missing",
            style("warning:").yellow().bold()
        );
    }
    for image in &extraction.images {
        println!("{}", image);
    }
    Ok(())
}
