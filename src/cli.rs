//! Command-line interface
//!
//! ```bash
//! prune-plots --root data single
//! prune-plots --root data --out plots grid --columns 4 --shared-y
//! prune-plots --config plots.json curves --batch-size 64 --batch-size 1024
//! prune-plots scan
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "prune-plots")]
#[command(version)]
#[command(about = "Charts for pruning experiment results: IPA vs pruning percentage and CE_TEST loss curves")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory scanned for experiment output
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Directory charts are written to
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// One chart per dataset and layer configuration, a series per batch size
    Single,

    /// One chart per dataset, a series per batch size
    ByDataset(ByDatasetArgs),

    /// Every dataset / layer / batch size series in one chart
    Combined,

    /// All result files as subplots of a single image
    Grid(GridArgs),

    /// CE_TEST vs batch number per batch size, layer and pruning percentage
    Curves(CurvesArgs),

    /// List discovered files and the metadata inferred from their paths
    Scan,
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct ByDatasetArgs {
    /// Plot only this result table instead of walking the root
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct GridArgs {
    /// Subplots per row
    #[arg(long)]
    pub columns: Option<usize>,

    /// Use one y axis range for every subplot
    #[arg(long)]
    pub shared_y: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct CurvesArgs {
    /// Batch sizes to plot (repeatable)
    #[arg(long = "batch-size")]
    pub batch_sizes: Vec<u32>,
}

pub fn parse_args<I, T>(args: I) -> std::result::Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json(path)?,
            None => Config::default(),
        };

        if let Some(root) = &self.root {
            config.root_dir = root.clone();
        }
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        match &self.command {
            Command::Grid(args) => {
                if let Some(columns) = args.columns {
                    config.grid_columns = columns;
                }
                config.shared_y_axis |= args.shared_y;
            }
            Command::Curves(args) if !args.batch_sizes.is_empty() => {
                config.curve_batch_sizes = args.batch_sizes.clone();
            }
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_single() {
        let cli = parse_args(["prune-plots", "single"]).unwrap();
        assert_eq!(cli.command, Command::Single);
        assert!(!cli.verbose);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse_args(["prune-plots", "combined", "--root", "runs", "--out", "charts", "-v"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("runs")));
        assert_eq!(cli.log_filter(), "debug");
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.root_dir, PathBuf::from("runs"));
        assert_eq!(config.output_dir, PathBuf::from("charts"));
    }

    #[test]
    fn test_grid_overrides() {
        let cli = parse_args(["prune-plots", "grid", "--columns", "4", "--shared-y"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.grid_columns, 4);
        assert!(config.shared_y_axis);
    }

    #[test]
    fn test_grid_zero_columns_rejected() {
        let cli = parse_args(["prune-plots", "grid", "--columns", "0"]).unwrap();
        assert!(matches!(cli.resolve_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_curves_batch_sizes() {
        let cli = parse_args(["prune-plots", "curves", "--batch-size", "64", "--batch-size", "1024"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.curve_batch_sizes, vec![64, 1024]);

        let cli = parse_args(["prune-plots", "curves"]).unwrap();
        assert_eq!(cli.resolve_config().unwrap().curve_batch_sizes, vec![1024]);
    }

    #[test]
    fn test_by_dataset_file() {
        let cli = parse_args(["prune-plots", "by-dataset", "--file", "data/L_1_SLP_FMNIST/prune_layers_ALL_output.txt"]).unwrap();
        match cli.command {
            Command::ByDataset(args) => assert!(args.file.is_some()),
            other => panic!("Expected ByDataset command, got {:?}", other),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(parse_args(["prune-plots", "scan", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = parse_args(["prune-plots", "scan", "--config", "/nonexistent/plots.json"]).unwrap();
        assert!(matches!(cli.resolve_config(), Err(Error::Io(_))));
    }
}
