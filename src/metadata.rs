// metadata.rs

//! # Metadata Module
//!
//! Infers experiment identity from nothing but the path of a result file.
//!
//! A path is split into ordered segments (directories first, then the file
//! name with its convention suffix removed). Two kinds of lookup run over the
//! segments:
//! - marker rules (`MARKER_RULES`): a segment starting with a marker literal
//!   yields the text after it, e.g. `Conv-FMNIST_IPA_output_1` -> `FMNIST`
//! - enumerated lookups: a directory segment must contain `<marker>_<value>`
//!   for one of a fixed list of candidate values, e.g. `batch_size_1024`
//!
//! Nothing in here touches the filesystem.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub const DATASET_MARKER: &str = "Conv-";
pub const LAYER_MARKER: &str = "prune_layers_";
pub const BATCH_SIZE_MARKER: &str = "batch_size";
pub const PERCENTAGE_MARKER: &str = "p-percentage";

// longest first, FMNIST contains MNIST
pub const KNOWN_DATASETS: [&str; 3] = ["FMNIST", "MNIST", "CIFAR"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    Named(String),
    Unknown,
}

impl Dataset {
    pub fn is_known(&self) -> bool {
        matches!(self, Dataset::Named(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Dataset::Named(name) => name,
            Dataset::Unknown => "Unknown",
        }
    }

    // legend order used by the loss-curve charts: MNIST, FMNIST, CIFAR, then the rest
    pub fn plot_rank(&self) -> usize {
        match self.name() {
            "MNIST" => 0,
            "FMNIST" => 1,
            "CIFAR" => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which class of layers a run pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum LayerConfig {
    #[serde(rename = "CONV")]
    Conv,
    #[serde(rename = "FHL")]
    FirstHidden,
    #[serde(rename = "SHL")]
    SecondHidden,
    #[serde(rename = "FHL+SHL")]
    BothHidden,
    #[serde(rename = "ALL")]
    All,
}

impl LayerConfig {
    pub const ALL_CONFIGS: [LayerConfig; 5] = [
        LayerConfig::Conv,
        LayerConfig::FirstHidden,
        LayerConfig::SecondHidden,
        LayerConfig::BothHidden,
        LayerConfig::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerConfig::Conv => "CONV",
            LayerConfig::FirstHidden => "FHL",
            LayerConfig::SecondHidden => "SHL",
            LayerConfig::BothHidden => "FHL+SHL",
            LayerConfig::All => "ALL",
        }
    }
}

impl fmt::Display for LayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LayerConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerConfig::ALL_CONFIGS
            .iter()
            .find(|layer| layer.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown layer configuration '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Dataset,
    Layer,
}

#[derive(Debug, Clone, Copy)]
pub enum Extraction {
    /// text after the marker, up to the first of these characters
    UntilAny(&'static [char]),
    /// all text after the marker
    Remainder,
}

#[derive(Debug, Clone, Copy)]
pub struct MarkerRule {
    pub field: Field,
    pub marker: &'static str,
    pub extraction: Extraction,
}

impl MarkerRule {
    fn apply(&self, segment: &str) -> Option<String> {
        let rest = segment.strip_prefix(self.marker)?;
        let value = match self.extraction {
            Extraction::UntilAny(delimiters) => rest.split(delimiters).next().unwrap_or(""),
            Extraction::Remainder => rest,
        };
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

pub const MARKER_RULES: &[MarkerRule] = &[
    MarkerRule {
        field: Field::Dataset,
        marker: DATASET_MARKER,
        extraction: Extraction::UntilAny(&['-', '_']),
    },
    MarkerRule {
        field: Field::Layer,
        marker: LAYER_MARKER,
        extraction: Extraction::Remainder,
    },
];

/// Ordered path segments of a file path. The last segment is taken as the
/// file name and has the naming-convention suffix (or,
/// failing that, its extension) removed so marker rules see `prune_layers_ALL`
/// rather than `prune_layers_ALL_output.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegments {
    pub dirs: Vec<String>,
    pub file: Option<String>,
}

impl PathSegments {
    pub fn new(path: &Path, file_suffix: &str) -> Self {
        let mut parts: Vec<String> = path
            .iter()
            .map(|part| part.to_string_lossy())
            .flat_map(|part| {
                part.split('\\')
                    .filter(|s| !s.is_empty() && *s != "/" && *s != ".")
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let file = parts.pop().map(|name| strip_file_suffix(&name, file_suffix));

        Self { dirs: parts, file }
    }

    pub fn all(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.dirs.iter().map(String::as_str).chain(self.file.as_deref())
    }
}

fn strip_file_suffix(name: &str, suffix: &str) -> String {
    if !suffix.is_empty() {
        if let Some(stem) = name.strip_suffix(suffix) {
            return stem.to_string();
        }
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name.to_string(),
    }
}

/// Innermost segment wins when several carry the same marker.
pub fn marker_value(segments: &PathSegments, field: Field) -> Option<String> {
    MARKER_RULES
        .iter()
        .filter(|rule| rule.field == field)
        .find_map(|rule| segments.all().rev().find_map(|segment| rule.apply(segment)))
}

pub fn scan_known_datasets(segments: &PathSegments) -> Option<Dataset> {
    let upper: Vec<String> = segments.all().map(str::to_ascii_uppercase).collect();
    KNOWN_DATASETS
        .iter()
        .find(|name| upper.iter().any(|segment| segment.contains(*name)))
        .map(|name| Dataset::Named(name.to_string()))
}

pub fn infer_dataset(segments: &PathSegments) -> Dataset {
    marker_value(segments, Field::Dataset)
        .map(Dataset::Named)
        .or_else(|| scan_known_datasets(segments))
        .unwrap_or(Dataset::Unknown)
}

pub fn infer_layer(segments: &PathSegments) -> Option<LayerConfig> {
    marker_value(segments, Field::Layer).and_then(|value| value.parse().ok())
}

/// True when `token` occurs in `segment` with no identifier characters glued to either side.
pub fn contains_token(segment: &str, token: &str) -> bool {
    let glued = |c: char| c.is_ascii_alphanumeric() || c == '.' || c == '+';
    segment.match_indices(token).any(|(start, _)| {
        let before = segment[..start].chars().next_back();
        let after = segment[start + token.len()..].chars().next();
        !before.is_some_and(glued) && !after.is_some_and(glued)
    })
}

/// First candidate (in list order) whose `<marker>_<value>` token appears in a directory segment.
pub fn match_enumerated<'a, T>(
    segments: &PathSegments,
    marker: &str,
    candidates: &'a [T],
    render: impl Fn(&T) -> String,
) -> Option<&'a T> {
    candidates.iter().find(|candidate| {
        let token = format!("{}_{}", marker, render(candidate));
        segments.dirs.iter().any(|segment| contains_token(segment, &token))
    })
}

/// True when a directory segment carries `<marker>_<value>` for any value,
/// listed as a candidate or not.
pub fn mentions_marker(segments: &PathSegments, marker: &str) -> bool {
    let prefix = format!("{}_", marker);
    segments.dirs.iter().any(|segment| {
        segment.match_indices(prefix.as_str()).any(|(start, _)| {
            let before = segment[..start].chars().next_back();
            let value = segment[start + prefix.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && value.is_some_and(|c| c.is_ascii_alphanumeric())
        })
    })
}

// shortest round-trip text, 0.3 -> "0.3", 1.0 -> "1.0"
pub fn format_fraction(value: f64) -> String {
    format!("{:?}", value)
}

/// Candidate values for directory-driven lookups.
#[derive(Debug, Clone)]
pub struct Candidates {
    pub batch_sizes: Vec<u32>,
    pub layers: Vec<LayerConfig>,
    pub prune_fractions: Vec<f64>,
}

/// Best-effort identity of a source file. Unresolved fields stay `None` / `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMetadata {
    pub dataset: Dataset,
    pub layer: Option<LayerConfig>,
    pub batch_size: Option<u32>,
    pub prune_fraction: Option<f64>,
}

impl PathMetadata {
    /// dataset and layer from marker-prefixed segments (result tables)
    pub fn from_markers(path: &Path, file_suffix: &str) -> Self {
        let segments = PathSegments::new(path, file_suffix);
        Self {
            dataset: infer_dataset(&segments),
            layer: infer_layer(&segments),
            batch_size: None,
            prune_fraction: None,
        }
    }

    /// All four fields from directory tokens (training logs). The dataset
    /// comes from the known-dataset scan only; a `Conv-` segment here names
    /// the experiment family, not the dataset.
    pub fn from_directories(path: &Path, file_suffix: &str, candidates: &Candidates) -> Self {
        let segments = PathSegments::new(path, file_suffix);
        let layer_marker = LAYER_MARKER.trim_end_matches('_');
        Self {
            dataset: scan_known_datasets(&segments).unwrap_or(Dataset::Unknown),
            layer: match_enumerated(&segments, layer_marker, &candidates.layers, |l| l.to_string()).copied(),
            batch_size: match_enumerated(&segments, BATCH_SIZE_MARKER, &candidates.batch_sizes, |b| {
                b.to_string()
            })
            .copied(),
            prune_fraction: match_enumerated(&segments, PERCENTAGE_MARKER, &candidates.prune_fractions, |p| {
                format_fraction(*p)
            })
            .copied(),
        }
    }

    /// names of the fields an aggregation key cannot do without
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.dataset.is_known() {
            missing.push("dataset");
        }
        if self.layer.is_none() {
            missing.push("layer");
        }
        missing
    }

    pub fn is_resolved(&self) -> bool {
        self.missing().is_empty()
    }
}
