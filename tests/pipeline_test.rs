use std::fs;
use std::path::Path;

use prune_plots::cli::{parse_args, Command};
use prune_plots::commands::{run, run_by_dataset, run_combined, run_curves, run_grid, run_scan, run_single};
use prune_plots::pipeline::{collect_logs, collect_wide};
use prune_plots::{aggregate, global_range, Config, Dataset, Grouping, LayerConfig};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn config_for(root: &Path) -> Config {
    Config {
        root_dir: root.to_path_buf(),
        output_dir: root.join("plots"),
        ..Config::default()
    }
}

const MNIST_FHL: &str = "\
BS   P%   IPA_Average  STD
64   0.0  0.95         0.01
64   0.5  0.80         0.03
128  0.0  0.90         0.02
1024 0.0  0.93         0.02
1024 0.5  0.70         0.05
";

// P% written on a 0-100 scale
const CIFAR_CONV: &str = "\
BS   P%   IPA_Average  STD
1024 0    0.60         0.04
1024 30   0.52         0.06
";

fn result_tree() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "L_1_SLP_MNIST/Conv-MNIST_IPA_output_1/prune_layers_FHL_output.txt", MNIST_FHL);
    write(root, "L_1_SLP_CIFAR/Conv-CIFAR_IPA_output_1/prune_layers_CONV_output.txt", CIFAR_CONV);
    // no dataset anywhere in the path
    write(root, "scratch/prune_layers_ALL_output.txt", MNIST_FHL);
    // not part of the naming convention
    write(root, "L_1_SLP_MNIST/notes.txt", "BS P% IPA_Average STD\n");
    temp_dir
}

#[test]
fn test_dataset_layer_grouping_end_to_end() {
    let temp_dir = result_tree();
    let config = config_for(temp_dir.path());

    let collection = collect_wide(temp_dir.path(), &config).unwrap();
    assert_eq!(collection.diagnostics.discovered, 3);
    assert_eq!(collection.diagnostics.unresolved, 1);
    assert_eq!(collection.files.len(), 2);

    let groups = aggregate(Grouping::DatasetLayer, collection.files, Some(config.batch_sizes.as_slice()));
    assert_eq!(groups.len(), 2);

    let cifar = &groups[0];
    assert_eq!(cifar.key.to_string(), "CIFAR-CONV");
    assert_eq!(cifar.series.len(), 1);
    let fractions: Vec<f64> = cifar.series[0].records.iter().map(|r| r.prune_fraction).collect();
    assert_eq!(fractions, vec![0.0, 0.3]);

    let mnist = &groups[1];
    assert_eq!(mnist.key.dataset, Some(Dataset::Named("MNIST".to_string())));
    assert_eq!(mnist.key.layer, Some(LayerConfig::FirstHidden));
    // 128 is filtered out, the rest sorted ascending
    let labels: Vec<String> = mnist.series.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["BS = 64", "BS = 1024"]);
    assert!(mnist.sources.iter().all(|p| !p.starts_with(temp_dir.path().join("scratch"))));
}

#[test]
fn test_shared_range_covers_error_bars() {
    let temp_dir = result_tree();
    let config = config_for(temp_dir.path());
    let collection = collect_wide(temp_dir.path(), &config).unwrap();
    let groups = aggregate(Grouping::Flat, collection.files, Some(config.batch_sizes.as_slice()));

    assert_eq!(groups.len(), 2);
    let (lo, hi) = global_range(groups.iter().flat_map(|g| g.records())).unwrap();
    assert!((lo - 0.46).abs() < 1e-9);
    assert!((hi - 0.96).abs() < 1e-9);
}

#[test]
fn test_flat_grid_keeps_cell_for_file_without_rows() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "Conv-MNIST_1/prune_layers_SHL_output.txt", "BS P% IPA_Average STD\n");
    write(root, "Conv-MNIST_2/prune_layers_ALL_output.txt", MNIST_FHL);
    let config = config_for(root);

    let collection = collect_wide(root, &config).unwrap();
    let groups = aggregate(Grouping::Flat, collection.files, Some(config.batch_sizes.as_slice()));
    assert_eq!(groups.len(), 2);
    assert!(groups[0].is_empty());
    assert_eq!(groups[0].key.layer, Some(LayerConfig::SecondHidden));
    assert_eq!(groups[0].sources.len(), 1);
    assert!(!groups[1].is_empty());
}

#[test]
fn test_log_curves_grouped_per_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let log = "\
Current_Epoch Batch_Total CE_Train Accuracy(%) CE_TEST Batch_Number
0 100 -- 0 2.30 0
0 100 1.20 60.5 1.10 50
0 100 0.90 75.0 oops 100
1 100 0.70 81.0 0.80 150
";
    for dataset in ["MNIST", "FMNIST", "CIFAR"] {
        write(
            root,
            &format!(
                "{0}/Conv-{0}_logs/prune_layers_FHL+SHL/batch_size_1024/p-percentage_0.3/seed_run_0.txt",
                dataset
            ),
            log,
        );
    }
    // FHL must not match the FHL+SHL directory above
    let config = Config {
        layers: vec![LayerConfig::FirstHidden, LayerConfig::BothHidden],
        ..config_for(root)
    };

    let collection = collect_logs(root, &config).unwrap();
    assert_eq!(collection.diagnostics.discovered, 3);
    assert_eq!(collection.diagnostics.unresolved, 0);
    assert_eq!(collection.diagnostics.dropped_rows, 3);
    assert_eq!(collection.diagnostics.placeholder_rows, 3);

    let groups = aggregate(
        Grouping::BatchLayerPercent,
        collection.files,
        Some(config.curve_batch_sizes.as_slice()),
    );
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.key.layer, Some(LayerConfig::BothHidden));
    assert_eq!(group.key.batch_size, Some(1024));
    assert_eq!(group.key.prune_fraction, Some(0.3));
    assert_eq!(group.series.len(), 3);

    let xs: Vec<f64> = group.series[0].records.iter().map(|r| r.x()).collect();
    // the "--" row and the non-numeric CE_TEST row are gone
    assert_eq!(xs, vec![50.0, 150.0]);
}

#[test]
fn test_empty_tree_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a/b/readme.md", "nothing here");
    let config = config_for(temp_dir.path());

    let report = run_single(&config, false).unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.diagnostics.discovered, 0);

    let report = run_curves(&config, false).unwrap();
    assert!(report.written.is_empty());
    assert!(!config.output_dir.exists());
}

#[test]
fn test_missing_root_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(&temp_dir.path().join("absent"));
    assert!(run(&Command::Single, &config, false).is_err());
    assert!(run_scan(&config).is_err());
}

#[test]
fn test_scan_counts_unresolved() {
    let temp_dir = result_tree();
    let report = run_scan(&config_for(temp_dir.path())).unwrap();
    assert_eq!(report.diagnostics.discovered, 3);
    assert_eq!(report.diagnostics.unresolved, 1);
    assert!(report.written.is_empty());
}

#[test]
fn test_config_file_and_flags_combine() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("plots.json");
    fs::write(&config_path, r#"{"output_dir": "charts", "grid_columns": 2, "batch_sizes": [64]}"#).unwrap();

    let cli = parse_args([
        "prune-plots",
        "--config",
        config_path.to_str().unwrap(),
        "--root",
        "runs",
        "grid",
        "--shared-y",
    ])
    .unwrap();
    let config = cli.resolve_config().unwrap();
    assert_eq!(config.root_dir, Path::new("runs"));
    assert_eq!(config.output_dir, Path::new("charts"));
    assert_eq!(config.grid_columns, 2);
    assert!(config.shared_y_axis);
    assert_eq!(config.batch_sizes, vec![64]);
}

fn assert_written(report: &prune_plots::commands::Report, out: &Path, expected: &[&str]) {
    let written: Vec<_> = report.written.iter().map(|p| p.strip_prefix(out).unwrap().to_path_buf()).collect();
    let expected: Vec<_> = expected.iter().map(|p| Path::new(p).to_path_buf()).collect();
    assert_eq!(written, expected);
    for path in &report.written {
        assert!(fs::metadata(path).unwrap().len() > 0, "{} is empty", path.display());
    }
}

#[test]
fn test_single_writes_one_chart_per_dataset_layer() {
    let temp_dir = result_tree();
    let config = config_for(temp_dir.path());
    let report = run_single(&config, false).unwrap();
    assert_written(
        &report,
        &config.output_dir,
        &[
            "CIFAR_CONV/Random-Pruning-Conv-CIFAR-CONV.png",
            "MNIST_FHL/Random-Pruning-Conv-MNIST-FHL.png",
        ],
    );
    assert_eq!(report.diagnostics.unresolved, 1);
}

#[test]
fn test_by_dataset_writes_one_chart_per_dataset() {
    let temp_dir = result_tree();
    let config = config_for(temp_dir.path());
    let report = run_by_dataset(&config, None, false).unwrap();
    assert_written(&report, &config.output_dir, &["CIFAR/CIFAR.png", "MNIST/MNIST.png"]);

    let file = temp_dir
        .path()
        .join("L_1_SLP_MNIST/Conv-MNIST_IPA_output_1/prune_layers_FHL_output.txt");
    let report = run_by_dataset(&config, Some(file), false).unwrap();
    assert_written(&report, &config.output_dir, &["MNIST/MNIST.png"]);
}

#[test]
fn test_combined_and_grid_write_single_images() {
    let temp_dir = result_tree();
    let config = Config {
        shared_y_axis: true,
        ..config_for(temp_dir.path())
    };
    let report = run_combined(&config).unwrap();
    assert_written(&report, &config.output_dir, &["combined_prune_plot.png"]);

    let report = run_grid(&config).unwrap();
    assert_written(&report, &config.output_dir, &["combined_subplot_1.png"]);
}

#[test]
fn test_curves_layout_by_batch_layer_and_percentage() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let log = "E T CE A CT B\n0 10 1.0 50 1.5 10\n0 10 0.8 60 1.2 20\n";
    write(root, "CIFAR/prune_layers_ALL/batch_size_1024/p-percentage_0.3/a_run_0.txt", log);
    write(root, "MNIST/prune_layers_ALL/batch_size_1024/p-percentage_0.3/a_run_0.txt", log);
    write(root, "MNIST/prune_layers_CONV/batch_size_1024/p-percentage_0.0/a_run_0.txt", log);
    // not in the default curve selection
    write(root, "MNIST/prune_layers_CONV/batch_size_64/p-percentage_0.0/a_run_0.txt", log);

    let config = config_for(root);
    let report = run_curves(&config, false).unwrap();
    assert_written(&report, &config.output_dir, &["1024/CONV/p-0.png", "1024/ALL/p-3.png"]);
    assert_eq!(report.diagnostics.deselected, 1);
    assert_eq!(report.diagnostics.unresolved, 0);
}
