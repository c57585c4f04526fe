// record.rs

use std::path::PathBuf;

use crate::metadata::{Dataset, LayerConfig, PathMetadata};
use crate::table::{LogTable, WideTable};

/// A discovered file and whatever its path told us about it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub meta: PathMetadata,
    /// position in discovery order
    pub index: usize,
}

impl SourceFile {
    pub fn new(path: PathBuf, meta: PathMetadata, index: usize) -> Self {
        Self { path, meta, index }
    }

    fn identity(&self) -> Option<(Dataset, LayerConfig)> {
        match (&self.meta.dataset, self.meta.layer) {
            (dataset @ Dataset::Named(_), Some(layer)) => Some((dataset.clone(), layer)),
            _ => None,
        }
    }

    /// One record per result-table row. `None` when dataset or layer is unresolved.
    pub fn wide_records(&self, table: &WideTable) -> Option<Vec<ExperimentRecord>> {
        let (dataset, layer) = self.identity()?;
        Some(
            table
                .rows
                .iter()
                .map(|row| ExperimentRecord {
                    dataset: dataset.clone(),
                    layer,
                    batch_size: row.batch_size,
                    prune_fraction: row.prune_fraction,
                    metric: row.ipa_average,
                    std_dev: Some(row.std),
                    sequence: None,
                })
                .collect(),
        )
    }

    /// One record per log row (CE_TEST against batch number). Batch size and
    /// pruning fraction come from the directory tokens and must be resolved too.
    pub fn log_records(&self, table: &LogTable) -> Option<Vec<ExperimentRecord>> {
        let (dataset, layer) = self.identity()?;
        let batch_size = self.meta.batch_size?;
        let prune_fraction = self.meta.prune_fraction?;
        Some(
            table
                .rows
                .iter()
                .map(|row| ExperimentRecord {
                    dataset: dataset.clone(),
                    layer,
                    batch_size,
                    prune_fraction,
                    metric: row.ce_test,
                    std_dev: None,
                    sequence: Some(row.batch_number),
                })
                .collect(),
        )
    }
}

/// One parsed data row with its experiment identity attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    pub dataset: Dataset,
    pub layer: LayerConfig,
    pub batch_size: u32,
    pub prune_fraction: f64,
    /// IPA average for result tables, CE_TEST for training logs
    pub metric: f64,
    pub std_dev: Option<f64>,
    /// batch number for loss curves
    pub sequence: Option<u64>,
}

impl ExperimentRecord {
    pub fn lower(&self) -> f64 {
        self.metric - self.std_dev.unwrap_or(0.0)
    }

    pub fn upper(&self) -> f64 {
        self.metric + self.std_dev.unwrap_or(0.0)
    }

    /// x coordinate: batch number for curves, pruning fraction otherwise
    pub fn x(&self) -> f64 {
        match self.sequence {
            Some(seq) => seq as f64,
            None => self.prune_fraction,
        }
    }
}
