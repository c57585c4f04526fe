// table.rs

//! Readers for the two whitespace-delimited table formats the experiment
//! pipeline writes.
//!
//! Result tables (`prune_layers_<LAYER>_output.txt`) carry their own header:
//!
//! ```text
//! BS    P%   IPA_Average  STD
//! 64    0.1  0.912        0.004
//! ```
//!
//! Training logs (`..._run_0.txt`) have a header that is thrown away in favour
//! of the fixed `LOG_COLUMNS` vocabulary.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{ParseError, RowCoercionError};

pub const COL_BATCH_SIZE: &str = "BS";
pub const COL_PRUNE: &str = "P%";
pub const COL_IPA_AVERAGE: &str = "IPA_Average";
pub const COL_STD: &str = "STD";

pub const LOG_COLUMNS: [&str; 6] = [
    "Current_Epoch",
    "Batch_Total",
    "CE_Train",
    "Accuracy(%)",
    "CE_TEST",
    "Batch_Number",
];
const LOG_CE_TRAIN: usize = 2;
const LOG_ACCURACY: usize = 3;
const LOG_CE_TEST: usize = 4;
const LOG_BATCH_NUMBER: usize = 5;

/// Marks a log row written before any training loss was available.
pub const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub batch_size: u32,
    /// always a fraction in [0, 1] after parsing
    pub prune_fraction: f64,
    pub ipa_average: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub rows: Vec<WideRow>,
    /// P% values were on a 0-100 scale and have been divided by 100
    pub percent_scaled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub epoch: Option<u64>,
    pub ce_train: Option<f64>,
    pub accuracy: Option<f64>,
    pub ce_test: f64,
    pub batch_number: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogTable {
    pub rows: Vec<LogRow>,
    pub placeholder_rows: usize,
    pub dropped: Vec<RowCoercionError>,
}

// collapse runs of whitespace to single tabs, keeping line numbers intact
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(&line.split_whitespace().collect::<Vec<_>>().join("\t"));
        out.push('\n');
    }
    out
}

fn open_table(path: &Path, has_headers: bool) -> Result<csv::Reader<std::io::Cursor<String>>, ParseError> {
    let text = fs::read_to_string(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(has_headers)
        .from_reader(std::io::Cursor::new(normalize_whitespace(&text))))
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn parse_f64(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

// accepts "64" as well as "64.0"
fn parse_whole(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().or_else(|| {
        parse_f64(value)
            .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
            .map(|v| v as u64)
    })
}

/// Read a result table with `BS P% IPA_Average STD` columns (extra columns are ignored).
pub fn parse_wide(path: &Path) -> Result<WideTable, ParseError> {
    let mut reader = open_table(path, true)?;
    let csv_err = |source: csv::Error| ParseError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        return Err(ParseError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let required = [COL_BATCH_SIZE, COL_PRUNE, COL_IPA_AVERAGE, COL_STD];
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !headers.iter().any(|h| h == **name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }
    let index_of = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
    let (bs_idx, p_idx, ipa_idx, std_idx) = (
        index_of(COL_BATCH_SIZE),
        index_of(COL_PRUNE),
        index_of(COL_IPA_AVERAGE),
        index_of(COL_STD),
    );

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = line_of(&record);
        if record.len() != headers.len() {
            return Err(ParseError::ColumnCount {
                path: path.to_path_buf(),
                line,
                expected: headers.len(),
                found: record.len(),
            });
        }

        let invalid = |column: &str, value: &str| ParseError::InvalidValue {
            path: path.to_path_buf(),
            line,
            column: column.to_string(),
            value: value.to_string(),
        };
        let number = |idx: usize, column: &str| {
            parse_f64(&record[idx]).ok_or_else(|| invalid(column, &record[idx]))
        };

        let batch_size = parse_whole(&record[bs_idx])
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid(COL_BATCH_SIZE, &record[bs_idx]))?;

        rows.push(WideRow {
            batch_size,
            prune_fraction: number(p_idx, COL_PRUNE)?,
            ipa_average: number(ipa_idx, COL_IPA_AVERAGE)?,
            std: number(std_idx, COL_STD)?,
        });
    }

    let percent_scaled = rows.iter().any(|row| row.prune_fraction > 1.0);
    if percent_scaled {
        debug!("{}: P% column is on a 0-100 scale, converting to fractions", path.display());
        for row in &mut rows {
            row.prune_fraction /= 100.0;
        }
    }

    Ok(WideTable {
        rows,
        percent_scaled,
    })
}

/// Read a training log. Placeholder and non-numeric rows are dropped, not fatal.
pub fn parse_log(path: &Path) -> Result<LogTable, ParseError> {
    let mut reader = open_table(path, false)?;
    let mut records = reader.records();

    // the header row is replaced by LOG_COLUMNS
    match records.next() {
        Some(Ok(_)) => {}
        Some(Err(source)) => {
            return Err(ParseError::Csv {
                path: path.to_path_buf(),
                source,
            })
        }
        None => {
            return Err(ParseError::MissingHeader {
                path: path.to_path_buf(),
            })
        }
    }

    let mut table = LogTable::default();
    for record in records {
        let record = record.map_err(|source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line_of(&record);
        if record.len() > LOG_COLUMNS.len() {
            return Err(ParseError::ColumnCount {
                path: PathBuf::from(path),
                line,
                expected: LOG_COLUMNS.len(),
                found: record.len(),
            });
        }

        if record.get(LOG_CE_TRAIN) == Some(PLACEHOLDER) {
            table.placeholder_rows += 1;
            continue;
        }

        match coerce_log_row(&record, line) {
            Ok(row) => table.rows.push(row),
            Err(e) => {
                debug!("{}: dropping row, {}", path.display(), e);
                table.dropped.push(e);
            }
        }
    }

    Ok(table)
}

fn coerce_log_row(record: &StringRecord, line: u64) -> Result<LogRow, RowCoercionError> {
    let required = |idx: usize| {
        let value = record.get(idx).unwrap_or("");
        parse_f64(value).ok_or_else(|| RowCoercionError {
            line,
            column: LOG_COLUMNS[idx],
            value: value.to_string(),
        })
    };

    let ce_test = required(LOG_CE_TEST)?;
    let batch_number = required(LOG_BATCH_NUMBER).and_then(|v| {
        parse_whole(&record[LOG_BATCH_NUMBER]).ok_or(RowCoercionError {
            line,
            column: LOG_COLUMNS[LOG_BATCH_NUMBER],
            value: v.to_string(),
        })
    })?;

    Ok(LogRow {
        epoch: record.get(0).and_then(parse_whole),
        ce_train: record.get(LOG_CE_TRAIN).and_then(parse_f64),
        accuracy: record.get(LOG_ACCURACY).and_then(parse_f64),
        ce_test,
        batch_number,
    })
}
