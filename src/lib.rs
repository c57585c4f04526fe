//! Locate pruning-experiment output, infer what each file describes from its
//! path, and chart the results.
//!
//! The pipeline is `walker` -> `metadata` -> `table` -> `aggregate`, tied
//! together in `pipeline`; `commands` renders the groups with `chart`.

pub mod aggregate;
pub mod chart;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod record;
pub mod table;
pub mod walker;

pub use aggregate::{aggregate, global_range, AggregationKey, Group, Grouping, Series};
pub use config::Config;
pub use error::{Error, ParseError, Result, RowCoercionError};
pub use metadata::{Dataset, LayerConfig, PathMetadata};
pub use record::{ExperimentRecord, SourceFile};
