//! flette CLI - build a static website from a directory of notebooks.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use flette_static::{LoadedConfig, SiteBuilder};

#[derive(Parser)]
#[command(name = "flette")]
#[command(about = "Turn a directory of Jupyter notebooks into a themed static website")]
#[command(version)]
pub struct Cli {
    /// Config file, or a directory containing fletteconf.yaml
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_err(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = LoadedConfig::load(cli.config.as_deref());

    let result = SiteBuilder::new(config).with_progress(true).build()?;

    tracing::info!(
        "Built {} pages and {} theme files in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );
    if !result.failed_assets.is_empty() {
        tracing::warn!("{} theme files were not copied", result.failed_assets.len());
    }

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}

/// Fatal errors already carry their cause in the message.
fn print_err(err: &anyhow::Error) {
    eprintln!("{} {}", style("error").red(), err);
}
