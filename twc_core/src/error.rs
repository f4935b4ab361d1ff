//! Errors that stop a run or a single zone.
//!
//! Per-row problems are [`RowError`](crate::row_parser::RowError)s and never abort anything.

use std::{io, path::PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::pickup::Zone;

/// The input does not match the expected schema. Nothing is written.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("the schema lists no date formats")]
    NoDateFormats,
    #[error("the schema maps no stream columns")]
    NoStreamColumns,
    #[error("invalid schema file: {0}")]
    Invalid(#[from] toml::de::Error),
}

/// A zone's schedule could not be rendered. Only that zone fails.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("{zone}: no all-day end date exists after {date}")]
    DateOutOfRange { zone: Zone, date: NaiveDate },
    #[error("{zone}: event for {date} is out of order or repeated")]
    Unordered { zone: Zone, date: NaiveDate },
    #[error("{zone}: event for {date} belongs to zone {found}")]
    ForeignEvent {
        zone: Zone,
        date: NaiveDate,
        found: Zone,
    },
    #[error("invalid date format {0:?}")]
    DateFormat(String),
    #[error("table encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("table encoding failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: {source}", .path.display())]
    Source { path: PathBuf, source: Box<Error> },
    #[error("unreadable table: {0}")]
    Csv(#[from] csv::Error),
    #[error("table line {line}: {message}")]
    InvalidTable { line: u64, message: String },
    #[error("no valid rows: {rows} rows read, {skipped} skipped")]
    NoValidRows { rows: usize, skipped: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
}
