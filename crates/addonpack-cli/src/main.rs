//! addonpack - package helm-chart addons with their images for offline clusters

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use addonpack_core::request::{DEFAULT_ADDON_TYPE, DEFAULT_ARCH};
use addonpack_core::{DigestAlgorithm, ImageTool, ManifestStyle, PackagerConfig};

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;
mod progress;
mod util;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "addonpack")]
#[command(author = "KubeClipper Contributors")]
#[command(version)]
#[command(
    about = "Package a helm-chart addon and its container images into an offline bundle",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: ~/.config/addonpack/config.yaml)
    #[arg(long, global = true, env = "ADDONPACK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build `<name>-<version>-<arch>.tar.gz` from a chart
    Package(PackageArgs),

    /// Render the chart and list the images it references
    Images {
        #[command(flatten)]
        chart: ChartArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the contents of a bundle
    Inspect {
        /// Bundle archive
        archive: PathBuf,

        /// Print the raw manifest files only
        #[arg(long)]
        manifest: bool,
    },

    /// Check a bundle's layout and manifest digests
    Verify {
        /// Bundle archive
        archive: PathBuf,
    },
}

/// Chart rendering inputs shared by `package` and `images`
#[derive(Args, Debug, Clone)]
pub struct ChartArgs {
    /// Unpacked chart directory
    #[arg(long)]
    pub chart_path: PathBuf,

    /// Values file (default: <chart-path>/values.yaml when present)
    #[arg(long)]
    pub values: Option<PathBuf>,

    /// helm executable
    #[arg(long, env = "ADDONPACK_HELM_BIN")]
    pub helm_bin: Option<PathBuf>,

    /// Extra argument for `helm template` (repeatable)
    #[arg(long = "helm-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub helm_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// Addon name; the bundle's top-level directory
    #[arg(long)]
    pub name: String,

    /// Addon version
    #[arg(long = "version", value_name = "VERSION")]
    pub addon_version: String,

    /// Addon type (cni, csi, cri, app)
    #[arg(long = "type", value_name = "TYPE", default_value = DEFAULT_ADDON_TYPE)]
    pub addon_type: String,

    /// Target architecture
    #[arg(long, default_value = DEFAULT_ARCH)]
    pub arch: String,

    /// Output archive (default: <name>-<version>-<arch>.tar.gz)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Image tool: nerdctl, docker or ctr
    #[arg(long, env = "ADDONPACK_IMAGE_TOOL")]
    pub image_tool: Option<ImageTool>,

    /// Image tool executable (default: the tool name on PATH)
    #[arg(long)]
    pub tool_binary: Option<PathBuf>,

    /// Pull missing images before saving (default)
    #[arg(long, overrides_with = "no_pull")]
    pub pull: bool,

    /// Save images from the local store without pulling
    #[arg(long = "no-pull", overrides_with = "pull")]
    pub no_pull: bool,

    /// Maximum concurrent pulls
    #[arg(long, env = "ADDONPACK_PARALLEL")]
    pub parallel: Option<usize>,

    /// containerd namespace used with ctr
    #[arg(long, env = "ADDONPACK_CTR_NAMESPACE")]
    pub ctr_namespace: Option<String>,

    /// Keep going when a pull fails; failed images are left out of the bundle
    #[arg(long)]
    pub ignore_pull_errors: bool,

    /// Metadata file style: digest (manifest.json) or simple (metadata.json)
    #[arg(long)]
    pub manifest_style: Option<ManifestStyle>,

    /// Digest algorithm for manifest.json: md5 or sha256
    #[arg(long = "digest", value_name = "ALGORITHM")]
    pub digest: Option<DigestAlgorithm>,
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Package(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::package::run(&args, &config).await
        }
        Commands::Images { chart, json } => {
            let config = load_config(cli.config.as_deref())?;
            commands::images::run(&chart, &config, json).await
        }
        Commands::Inspect { archive, manifest } => commands::inspect::run(&archive, manifest),
        Commands::Verify { archive } => commands::verify::run(&archive),
    }
}

fn load_config(path: Option<&Path>) -> Result<PackagerConfig> {
    match path {
        Some(path) if !path.is_file() => Err(CliError::usage(format!(
            "Configuration file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(PackagerConfig::load_from(path)?),
        None => Ok(PackagerConfig::load()?),
    }
}
