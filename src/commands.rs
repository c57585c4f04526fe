// commands.rs

//! Each subcommand picks a grouping and a chart layout and runs the shared
//! pipeline. An empty result is reported and is not an error.

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, global_range, Group, Grouping};
use crate::chart::{render_chart, render_grid, Panel};
use crate::cli::Command;
use crate::config::Config;
use crate::error::Result;
use crate::metadata::format_fraction;
use crate::pipeline::{collect_logs, collect_wide, collect_wide_paths, scan, Collection, Diagnostics};

const IPA_X_DESC: &str = "P%";
const IPA_Y_DESC: &str = "IPA Average";
const GRID_CELL: (u32, u32) = (600, 500);

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub written: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

pub fn run(command: &Command, config: &Config, show_progress: bool) -> Result<Report> {
    match command {
        Command::Single => run_single(config, show_progress),
        Command::ByDataset(args) => run_by_dataset(config, args.file.clone(), show_progress),
        Command::Combined => run_combined(config),
        Command::Grid(_) => run_grid(config),
        Command::Curves(_) => run_curves(config, show_progress),
        Command::Scan => run_scan(config),
    }
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

// logs EmptyResult once and says whether there is anything left to draw
fn has_data(collection: &Collection) -> bool {
    match collection.empty_result() {
        Some(e) => {
            warn!("{}", e);
            false
        }
        None => true,
    }
}

fn dataset_layer_names(group: &Group) -> (String, String) {
    let dataset = group.key.dataset.as_ref().map(|d| d.to_string()).unwrap_or_default();
    let layer = group.key.layer.map(|l| l.to_string()).unwrap_or_default();
    (dataset, layer)
}

// MNIST, FMNIST, CIFAR, then the rest in first-seen order
fn order_legend(group: &mut Group) {
    group.series.sort_by_key(|s| s.key.dataset.as_ref().map(|d| d.plot_rank()));
}

/// One chart per dataset + layer.
pub fn run_single(config: &Config, show_progress: bool) -> Result<Report> {
    let collection = collect_wide(&config.root_dir, config)?;
    let mut report = Report {
        diagnostics: collection.diagnostics.clone(),
        ..Report::default()
    };
    if !has_data(&collection) {
        return Ok(report);
    }

    let groups = aggregate(Grouping::DatasetLayer, collection.files, Some(config.batch_sizes.as_slice()));
    let pb = progress_bar(groups.len(), show_progress);
    for group in &groups {
        pb.inc(1);
        let (dataset, layer) = dataset_layer_names(group);
        if group.is_empty() {
            warn!("No batch size {:?} data for {}-{}", config.batch_sizes, dataset, layer);
            continue;
        }

        let title = format!("Random-Pruning-Conv-{}-{}", dataset, layer);
        let path = config
            .output_dir
            .join(format!("{}_{}", dataset, layer))
            .join(format!("{}.png", title));
        let panel = Panel {
            title,
            x_desc: IPA_X_DESC,
            y_desc: IPA_Y_DESC,
            series: &group.series,
            y_range: None,
            error_bars: true,
        };
        render_chart(&path, &panel, (config.image_width, config.image_height))?;
        info!("Plot saved to: {}", path.display());
        report.written.push(path);
    }
    pb.finish_and_clear();

    Ok(report)
}

/// One chart per dataset, every batch size in ascending order.
pub fn run_by_dataset(config: &Config, file: Option<PathBuf>, show_progress: bool) -> Result<Report> {
    let collection = match file {
        Some(path) => collect_wide_paths(vec![path], config),
        None => collect_wide(&config.root_dir, config)?,
    };
    let mut report = Report {
        diagnostics: collection.diagnostics.clone(),
        ..Report::default()
    };
    if !has_data(&collection) {
        return Ok(report);
    }

    let groups = aggregate(Grouping::Dataset, collection.files, None);
    let pb = progress_bar(groups.len(), show_progress);
    for group in &groups {
        pb.inc(1);
        let title = group.key.to_string();
        let path = config.output_dir.join(&title).join(format!("{}.png", title));
        let panel = Panel {
            title,
            x_desc: IPA_X_DESC,
            y_desc: IPA_Y_DESC,
            series: &group.series,
            y_range: None,
            error_bars: true,
        };
        render_chart(&path, &panel, (config.image_width, config.image_height))?;
        info!("Plot saved to: {}", path.display());
        report.written.push(path);
    }
    pb.finish_and_clear();

    Ok(report)
}

/// Everything on one chart.
pub fn run_combined(config: &Config) -> Result<Report> {
    let collection = collect_wide(&config.root_dir, config)?;
    let mut report = Report {
        diagnostics: collection.diagnostics.clone(),
        ..Report::default()
    };
    if !has_data(&collection) {
        return Ok(report);
    }

    let groups = aggregate(Grouping::Combined, collection.files, Some(config.batch_sizes.as_slice()));
    let group = match groups.into_iter().next().filter(|g| !g.is_empty()) {
        Some(group) => group,
        None => {
            warn!("No valid data to plot.");
            return Ok(report);
        }
    };

    let path = config.output_dir.join("combined_prune_plot.png");
    let panel = Panel {
        title: "Combined IPA vs Pruning Percentage".to_string(),
        x_desc: "Pruning Percentage (P%)",
        y_desc: IPA_Y_DESC,
        series: &group.series,
        y_range: None,
        error_bars: true,
    };
    render_chart(&path, &panel, (config.image_width * 6 / 5, config.image_height * 4 / 3))?;
    info!("Combined plot saved to: {}", path.display());
    report.written.push(path);

    Ok(report)
}

/// Every result file as a subplot, in discovery order.
pub fn run_grid(config: &Config) -> Result<Report> {
    let collection = collect_wide(&config.root_dir, config)?;
    let mut report = Report {
        diagnostics: collection.diagnostics.clone(),
        ..Report::default()
    };
    if !has_data(&collection) {
        return Ok(report);
    }

    let groups = aggregate(Grouping::Flat, collection.files, Some(config.batch_sizes.as_slice()));
    let shared = if config.shared_y_axis {
        global_range(groups.iter().flat_map(|g| g.records()))
    } else {
        None
    };
    debug!("grid of {} panels, shared y range {:?}", groups.len(), shared);

    let panels: Vec<Panel> = groups
        .iter()
        .map(|group| {
            let (dataset, layer) = dataset_layer_names(group);
            Panel {
                title: format!("Conv-{}-{}", dataset, layer),
                x_desc: IPA_X_DESC,
                y_desc: IPA_Y_DESC,
                series: &group.series,
                y_range: shared,
                error_bars: true,
            }
        })
        .collect();

    let path = config.output_dir.join("combined_subplot_1.png");
    render_grid(&path, &panels, config.grid_columns, GRID_CELL)?;
    info!("Saved all subplots to: {}", path.display());
    report.written.push(path);

    Ok(report)
}

/// CE_TEST loss curves for every batch size / layer / pruning percentage combination.
pub fn run_curves(config: &Config, show_progress: bool) -> Result<Report> {
    let collection = collect_logs(&config.root_dir, config)?;
    let mut report = Report {
        diagnostics: collection.diagnostics.clone(),
        ..Report::default()
    };
    if !has_data(&collection) {
        return Ok(report);
    }

    let mut groups = aggregate(
        Grouping::BatchLayerPercent,
        collection.files,
        Some(config.curve_batch_sizes.as_slice()),
    );
    groups.iter_mut().for_each(order_legend);

    let combinations = config.curve_batch_sizes.len() * config.layers.len() * config.prune_fractions.len();
    let pb = progress_bar(combinations, show_progress);
    for &batch_size in &config.curve_batch_sizes {
        for &layer in &config.layers {
            for (idx, &p) in config.prune_fractions.iter().enumerate() {
                pb.inc(1);
                let group = groups.iter().find(|g| {
                    g.key.batch_size == Some(batch_size)
                        && g.key.layer == Some(layer)
                        && g.key.prune_fraction == Some(p)
                });
                let group = match group.filter(|g| !g.is_empty()) {
                    Some(group) => group,
                    None => {
                        debug!(
                            "No files for batch={}, layer={}, pruning%={}",
                            batch_size,
                            layer,
                            format_fraction(p)
                        );
                        continue;
                    }
                };

                let path = config
                    .output_dir
                    .join(batch_size.to_string())
                    .join(layer.as_str())
                    .join(format!("p-{}.png", idx));
                let panel = Panel {
                    title: format!(
                        "CE_TEST vs Batch_Number (BS {}, {}, P {})",
                        batch_size,
                        layer,
                        format_fraction(p)
                    ),
                    x_desc: "Batch Number",
                    y_desc: "CE_TEST",
                    series: &group.series,
                    y_range: None,
                    error_bars: false,
                };
                render_chart(&path, &panel, (config.image_width * 6 / 5, config.image_height * 4 / 3))?;
                info!("Saved plot: {}", path.display());
                report.written.push(path);
            }
        }
    }
    pb.finish_and_clear();

    if report.written.is_empty() {
        warn!("No valid data to plot for any batch size / layer / pruning percentage");
    }
    Ok(report)
}

/// Print what discovery and extraction make of the tree.
pub fn run_scan(config: &Config) -> Result<Report> {
    let sources = scan(&config.root_dir, config)?;
    let mut report = Report::default();
    report.diagnostics.discovered = sources.len();

    for source in &sources {
        let missing = source.meta.missing();
        if missing.is_empty() {
            let mut line = format!(
                "{}\tdataset={} layer={}",
                source.path.display(),
                source.meta.dataset,
                source.meta.layer.map(|l| l.to_string()).unwrap_or_default()
            );
            if let Some(bs) = source.meta.batch_size {
                line.push_str(&format!(" batch_size={}", bs));
            }
            if let Some(p) = source.meta.prune_fraction {
                line.push_str(&format!(" p={}", format_fraction(p)));
            }
            println!("{}", line);
        } else {
            report.diagnostics.unresolved += 1;
            println!("{}\tunresolved: {}", source.path.display(), missing.join(", "));
        }
    }

    if sources.is_empty() {
        warn!("no files matched under {}", config.root_dir.display());
    }
    Ok(report)
}
