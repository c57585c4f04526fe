// aggregate.rs

//! Buckets experiment records into chart groups, and within each group into
//! the series drawn on that chart.

use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::metadata::{format_fraction, Dataset, LayerConfig};
use crate::record::{ExperimentRecord, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// one chart per dataset + layer, a series per batch size
    DatasetLayer,
    /// one chart per dataset, a series per batch size
    Dataset,
    /// one chart per batch size + layer + pruning fraction, a series per dataset
    BatchLayerPercent,
    /// one chart per source file in discovery order, a series per batch size
    Flat,
    /// a single chart, a series per dataset + layer + batch size
    Combined,
}

impl Grouping {
    fn sorts_batch_sizes(&self) -> bool {
        matches!(self, Grouping::DatasetLayer | Grouping::Dataset | Grouping::Flat)
    }

    fn keys(&self, record: &ExperimentRecord, source: &SourceFile) -> (AggregationKey, AggregationKey) {
        let dataset = Some(record.dataset.clone());
        let layer = Some(record.layer);
        let batch_size = Some(record.batch_size);
        let by_batch = AggregationKey {
            batch_size,
            ..AggregationKey::default()
        };
        match self {
            Grouping::DatasetLayer => (
                AggregationKey {
                    dataset,
                    layer,
                    ..AggregationKey::default()
                },
                by_batch,
            ),
            Grouping::Dataset => (
                AggregationKey {
                    dataset,
                    ..AggregationKey::default()
                },
                by_batch,
            ),
            Grouping::BatchLayerPercent => (
                AggregationKey {
                    layer,
                    batch_size,
                    prune_fraction: Some(record.prune_fraction),
                    ..AggregationKey::default()
                },
                AggregationKey {
                    dataset,
                    ..AggregationKey::default()
                },
            ),
            Grouping::Flat => (Self::flat_key(source), by_batch),
            Grouping::Combined => (
                AggregationKey::default(),
                AggregationKey {
                    dataset,
                    layer,
                    batch_size,
                    ..AggregationKey::default()
                },
            ),
        }
    }

    fn flat_key(source: &SourceFile) -> AggregationKey {
        AggregationKey {
            dataset: Some(source.meta.dataset.clone()),
            layer: source.meta.layer,
            index: Some(source.index),
            ..AggregationKey::default()
        }
    }
}

/// Identity of a group or series. Fields a grouping mode does not use stay `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationKey {
    pub dataset: Option<Dataset>,
    pub layer: Option<LayerConfig>,
    pub batch_size: Option<u32>,
    pub prune_fraction: Option<f64>,
    pub index: Option<usize>,
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.dataset, self.layer, self.batch_size) {
            (Some(dataset), Some(layer), Some(bs)) => write!(f, "{}-{} (BS={})", dataset, layer, bs),
            (Some(dataset), Some(layer), None) => write!(f, "{}-{}", dataset, layer),
            (Some(dataset), None, _) => write!(f, "{}", dataset),
            (None, layer, Some(bs)) => {
                write!(f, "BS = {}", bs)?;
                if let Some(layer) = layer {
                    write!(f, ", {}", layer)?;
                }
                if let Some(p) = self.prune_fraction {
                    write!(f, ", P = {}", format_fraction(p))?;
                }
                Ok(())
            }
            _ => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: AggregationKey,
    pub records: Vec<ExperimentRecord>,
}

impl Series {
    pub fn label(&self) -> String {
        self.key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: AggregationKey,
    pub series: Vec<Series>,
    /// files that contributed to this group, in discovery order
    pub sources: Vec<PathBuf>,
}

impl Group {
    fn new(key: AggregationKey) -> Self {
        Self {
            key,
            series: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &ExperimentRecord> {
        self.series.iter().flat_map(|s| s.records.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.records.is_empty())
    }
}

/// Group parsed files. Unresolved sources never reach a group. `batch_sizes`
/// restricts which batch sizes become series.
pub fn aggregate<I>(grouping: Grouping, inputs: I, batch_sizes: Option<&[u32]>) -> Vec<Group>
where
    I: IntoIterator<Item = (SourceFile, Vec<ExperimentRecord>)>,
{
    let mut groups: Vec<Group> = Vec::new();

    for (source, records) in inputs {
        if !source.meta.is_resolved() {
            warn!(
                "excluding {} from aggregation, unresolved {}",
                source.path.display(),
                source.meta.missing().join(", ")
            );
            continue;
        }

        // every resolved file keeps its grid cell, even with no rows to draw
        if grouping == Grouping::Flat {
            let mut cell = Group::new(Grouping::flat_key(&source));
            cell.sources.push(source.path.clone());
            groups.push(cell);
        }

        for record in records {
            if let Some(allowed) = batch_sizes {
                if !allowed.contains(&record.batch_size) {
                    continue;
                }
            }
            let (group_key, series_key) = grouping.keys(&record, &source);

            let group_idx = match groups.iter().position(|g| g.key == group_key) {
                Some(idx) => idx,
                None => {
                    groups.push(Group::new(group_key));
                    groups.len() - 1
                }
            };
            let group = &mut groups[group_idx];
            if !group.sources.contains(&source.path) {
                group.sources.push(source.path.clone());
            }

            match group.series.iter_mut().find(|s| s.key == series_key) {
                Some(series) => series.records.push(record),
                None => group.series.push(Series {
                    key: series_key,
                    records: vec![record],
                }),
            }
        }
    }

    if grouping.sorts_batch_sizes() {
        for group in &mut groups {
            group.series.sort_by_key(|s| s.key.batch_size);
        }
    }

    groups
}

/// Smallest `metric - std` and largest `metric + std` over all records, for a
/// shared y axis. A missing std counts as zero.
pub fn global_range<'a, I>(records: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a ExperimentRecord>,
{
    records.into_iter().fold(None, |range, record| {
        let (lo, hi) = (record.lower(), record.upper());
        Some(match range {
            None => (lo, hi),
            Some((min, max)) => (f64::min(min, lo), f64::max(max, hi)),
        })
    })
}
