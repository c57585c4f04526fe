use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prune_plots::cli::Cli;
use prune_plots::commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v / -q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = cli.resolve_config().context("Error loading config")?;
    info!(
        "root: {}, output: {}",
        config.root_dir.display(),
        config.output_dir.display()
    );

    let report = commands::run(&cli.command, &config, !cli.quiet)
        .with_context(|| format!("Error processing {}", config.root_dir.display()))?;

    let d = &report.diagnostics;
    if d.unresolved + d.parse_failures > 0 {
        warn!(
            "{} file(s) skipped: {} unresolved, {} unreadable",
            d.unresolved + d.parse_failures,
            d.unresolved,
            d.parse_failures
        );
    }
    if d.deselected > 0 {
        info!("{} log(s) outside the selected batch sizes or percentages", d.deselected);
    }
    info!("{} chart(s) written", report.written.len());
    Ok(())
}
