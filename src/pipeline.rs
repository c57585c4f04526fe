// pipeline.rs

//! discover -> extract metadata -> parse -> drop unresolved
//!
//! Each file is handled on its own: a file that cannot be resolved or parsed
//! is logged, counted in [`Diagnostics`] and skipped. Only an unreadable root
//! directory stops the walk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::{mentions_marker, PathMetadata, PathSegments, BATCH_SIZE_MARKER, PERCENTAGE_MARKER};
use crate::record::{ExperimentRecord, SourceFile};
use crate::table::{parse_log, parse_wide};
use crate::walker::{walk, FileFilter};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub discovered: usize,
    pub unresolved: usize,
    pub parse_failures: usize,
    /// log rows dropped because CE_TEST or Batch_Number was not numeric
    pub dropped_rows: usize,
    /// log rows with `--` as training loss
    pub placeholder_rows: usize,
    /// older log files shadowed by a later one with the same identity
    pub superseded: usize,
    /// well-formed logs whose batch size or percentage is not in the selection
    pub deselected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub files: Vec<(SourceFile, Vec<ExperimentRecord>)>,
    pub diagnostics: Diagnostics,
}

impl Collection {
    pub fn record_count(&self) -> usize {
        self.files.iter().map(|(_, records)| records.len()).sum()
    }

    /// `Some(EmptyResult)` when nothing matched or nothing parsed into rows.
    pub fn empty_result(&self) -> Option<Error> {
        if self.diagnostics.discovered == 0 {
            Some(Error::EmptyResult("no files matched the naming convention".to_string()))
        } else if self.record_count() == 0 {
            Some(Error::EmptyResult(format!(
                "{} file(s) matched but none produced usable rows",
                self.diagnostics.discovered
            )))
        } else {
            None
        }
    }
}

pub fn wide_filter(config: &Config) -> FileFilter {
    FileFilter::new()
        .with_prefix(&config.wide_prefix)
        .with_suffix(&config.wide_suffix)
}

pub fn log_filter(config: &Config) -> FileFilter {
    FileFilter::new().with_suffix(&config.log_suffix)
}

/// Walk `root` for result tables and parse every resolvable one.
pub fn collect_wide(root: &Path, config: &Config) -> Result<Collection> {
    let paths = walk(root, wide_filter(config))?;
    Ok(collect_wide_paths(paths, config))
}

/// Same as [`collect_wide`] for an explicit list of files.
pub fn collect_wide_paths<I>(paths: I, config: &Config) -> Collection
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut collection = Collection::default();

    for (index, path) in paths.into_iter().enumerate() {
        collection.diagnostics.discovered += 1;
        let source = SourceFile::new(
            path.clone(),
            PathMetadata::from_markers(&path, &config.wide_suffix),
            index,
        );

        if !source.meta.is_resolved() {
            warn!(
                "skipping {}: could not infer {}",
                path.display(),
                source.meta.missing().join(" or ")
            );
            collection.diagnostics.unresolved += 1;
            continue;
        }

        let table = match parse_wide(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                collection.diagnostics.parse_failures += 1;
                continue;
            }
        };

        if let Some(records) = source.wide_records(&table) {
            debug!("{}: {} rows", path.display(), records.len());
            collection.files.push((source, records));
        }
    }

    info!(
        "found {} result file(s), {} usable",
        collection.diagnostics.discovered,
        collection.files.len()
    );
    collection
}

enum LogIdentity {
    Resolved,
    /// batch size or percentage token present, value not selected
    Deselected,
    Unresolved(Vec<&'static str>),
}

fn classify_log(meta: &PathMetadata, segments: &PathSegments) -> LogIdentity {
    let mut missing = meta.missing();
    let mut deselected = false;
    let lookups = [
        ("batch size", BATCH_SIZE_MARKER, meta.batch_size.is_some()),
        ("pruning percentage", PERCENTAGE_MARKER, meta.prune_fraction.is_some()),
    ];
    for (name, marker, found) in lookups {
        if found {
            continue;
        }
        if mentions_marker(segments, marker) {
            deselected = true;
        } else {
            missing.push(name);
        }
    }

    if !missing.is_empty() {
        LogIdentity::Unresolved(missing)
    } else if deselected {
        LogIdentity::Deselected
    } else {
        LogIdentity::Resolved
    }
}

/// Walk `root` for training logs. Identity comes from directory tokens only.
/// When two logs share dataset, layer, batch size and percentage, the one
/// discovered last is kept.
pub fn collect_logs(root: &Path, config: &Config) -> Result<Collection> {
    let candidates = config.candidates();
    let mut collection = Collection::default();

    for (index, path) in walk(root, log_filter(config))?.enumerate() {
        collection.diagnostics.discovered += 1;
        let source = SourceFile::new(
            path.clone(),
            PathMetadata::from_directories(&path, &config.log_suffix, &candidates),
            index,
        );

        let segments = PathSegments::new(&path, &config.log_suffix);
        match classify_log(&source.meta, &segments) {
            LogIdentity::Resolved => {}
            LogIdentity::Deselected => {
                debug!("skipping {}: batch size or percentage not selected", path.display());
                collection.diagnostics.deselected += 1;
                continue;
            }
            LogIdentity::Unresolved(missing) => {
                warn!("skipping {}: could not infer {}", path.display(), missing.join(", "));
                collection.diagnostics.unresolved += 1;
                continue;
            }
        }

        let table = match parse_log(&path) {
            Ok(table) => table,
            Err(e) => {
                warn!("error loading {}: {}", path.display(), e);
                collection.diagnostics.parse_failures += 1;
                continue;
            }
        };
        collection.diagnostics.dropped_rows += table.dropped.len();
        collection.diagnostics.placeholder_rows += table.placeholder_rows;

        if let Some(records) = source.log_records(&table) {
            if let Some(pos) = collection.files.iter().position(|(s, _)| s.meta == source.meta) {
                debug!(
                    "{} supersedes {}",
                    path.display(),
                    collection.files[pos].0.path.display()
                );
                collection.files.remove(pos);
                collection.diagnostics.superseded += 1;
            }
            collection.files.push((source, records));
        }
    }

    info!(
        "found {} log file(s), {} usable",
        collection.diagnostics.discovered,
        collection.files.len()
    );
    Ok(collection)
}

/// Discovery and extraction only, for inspecting a tree.
pub fn scan(root: &Path, config: &Config) -> Result<Vec<SourceFile>> {
    let candidates = config.candidates();
    let mut sources: Vec<SourceFile> = walk(root, wide_filter(config))?
        .enumerate()
        .map(|(index, path)| {
            let meta = PathMetadata::from_markers(&path, &config.wide_suffix);
            SourceFile::new(path, meta, index)
        })
        .collect();

    let offset = sources.len();
    sources.extend(
        walk(root, log_filter(config))?
            .enumerate()
            .map(|(index, path)| {
                let meta = PathMetadata::from_directories(&path, &config.log_suffix, &candidates);
                SourceFile::new(path, meta, offset + index)
            }),
    );
    Ok(sources)
}
