// error.rs

//! Error types for the locate / parse / aggregate pipeline.
//!
//! Only `RootInaccessible` and the config and render failures stop a run.
//! The other variants describe one file or one row and are logged and skipped
//! by the caller.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// the root directory could not be opened
    #[error("cannot access root directory {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// path did not carry the dataset and/or layer markers
    #[error("could not infer {missing} from {path}")]
    MetadataUnresolved { path: PathBuf, missing: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// nothing matched, or nothing was left to draw
    #[error("no data: {0}")]
    EmptyResult(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures that make a whole table unusable.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("{path} is missing columns: {}", .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{path} line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{path} line {line}: invalid value {value:?} in column {column}")]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
}

/// A single log row that could not be coerced. The row is dropped, the file is kept.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: cannot coerce {column} value {value:?}")]
pub struct RowCoercionError {
    pub line: u64,
    pub column: &'static str,
    pub value: String,
}
