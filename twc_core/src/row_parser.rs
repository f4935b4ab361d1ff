//! Reads the published pickup schedule and turns its rows into pickup events.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Read,
    path::Path,
};

use chrono::{Datelike, NaiveDate};
use csv::{ByteRecord, ReaderBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::{Error, SchemaError},
    pickup::{PickupEvent, Stream, StreamSet, Zone},
};

/// A row that was skipped. The run continues without it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("line {line}: unparseable date {value:?}")]
    Date { line: u64, value: String },
    #[error("line {line}: missing zone")]
    MissingZone { line: u64 },
    #[error("line {line}: invalid zone {value:?}")]
    InvalidZone { line: u64, value: String },
    #[error("line {line}: missing column {column:?}")]
    MissingColumn { line: u64, column: String },
    #[error("line {line}: unknown waste stream {value:?}")]
    UnknownStream { line: u64, value: String },
    #[error("line {line}: no waste stream is collected")]
    NoStreams { line: u64 },
    #[error("line {line}: empty row")]
    Empty { line: u64 },
}

impl RowError {
    pub fn line(&self) -> u64 {
        match self {
            RowError::Date { line, .. }
            | RowError::MissingZone { line }
            | RowError::InvalidZone { line, .. }
            | RowError::MissingColumn { line, .. }
            | RowError::UnknownStream { line, .. }
            | RowError::NoStreams { line }
            | RowError::Empty { line } => *line,
        }
    }

    fn at(mut self, source_line: u64) -> Self {
        match &mut self {
            RowError::Date { line, .. }
            | RowError::MissingZone { line }
            | RowError::InvalidZone { line, .. }
            | RowError::MissingColumn { line, .. }
            | RowError::UnknownStream { line, .. }
            | RowError::NoStreams { line }
            | RowError::Empty { line } => *line = source_line,
        }
        self
    }
}

/// Where the waste streams of a row are found.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamColumns {
    /// One column per stream. A blank or `0` cell means the stream is not collected.
    Flags(Vec<FlagColumn>),
    /// A single column naming the collected streams, e.g. `Garbage, Recycling`.
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlagColumn {
    pub column: String,
    pub stream: Stream,
}

/// The column layout and date formats of the input table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Schema {
    pub zone_column: String,
    pub date_column: String,
    pub streams: StreamColumns,
    /// Tried in order, the first one that parses wins.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

fn default_date_formats() -> Vec<String> {
    vec![String::from("%Y-%m-%d"), String::from("%d-%m-%Y")]
}

impl Default for Schema {
    /// The layout of the published pickup schedule:
    /// `_id,Calendar,WeekStarting,GreenBin,Garbage,Recycling,YardWaste,ChristmasTree`.
    fn default() -> Self {
        let flag = |column: &str, stream| FlagColumn {
            column: String::from(column),
            stream,
        };
        Schema {
            zone_column: String::from("Calendar"),
            date_column: String::from("WeekStarting"),
            streams: StreamColumns::Flags(vec![
                flag("GreenBin", Stream::Organics),
                flag("Garbage", Stream::Garbage),
                flag("Recycling", Stream::Recycling),
                flag("YardWaste", Stream::YardWaste),
                flag("ChristmasTree", Stream::ChristmasTree),
            ]),
            date_formats: default_date_formats(),
        }
    }
}

impl Schema {
    /// A long layout with one stream label column.
    pub fn labelled(zone_column: &str, date_column: &str, stream_column: &str) -> Self {
        Schema {
            zone_column: String::from(zone_column),
            date_column: String::from(date_column),
            streams: StreamColumns::Label(String::from(stream_column)),
            date_formats: default_date_formats(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Schema, SchemaError> {
        let schema: Schema = toml::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: &Path) -> Result<Schema, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Schema::from_toml(&text)?)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.date_formats.is_empty() {
            return Err(SchemaError::NoDateFormats);
        }
        if matches!(&self.streams, StreamColumns::Flags(flags) if flags.is_empty()) {
            return Err(SchemaError::NoStreamColumns);
        }
        Ok(())
    }

    /// Every column a row must have, in schema order.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.zone_column.as_str(), self.date_column.as_str()];
        match &self.streams {
            StreamColumns::Flags(flags) => {
                columns.extend(flags.iter().map(|flag| flag.column.as_str()))
            }
            StreamColumns::Label(column) => columns.push(column.as_str()),
        }
        columns
    }

    /// Fail with every required column that the header lacks.
    pub fn check_header<'a, I>(&self, header: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<&str> = header.into_iter().map(str::trim).collect();
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|column| !present.contains(column))
            .map(String::from)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingColumns(missing))
        }
    }

    /// Parse a date with the first matching format.
    ///
    /// `%Y` accepts any number of digits, so a two-digit year would land in the first
    /// century. Only four-digit years are taken.
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        self.date_formats
            .iter()
            .filter_map(|format| NaiveDate::parse_from_str(value, format).ok())
            .find(|date| (1000..=9999).contains(&date.year()))
    }
}

/// One input row: its source line and its cells by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: u64,
    pub values: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new<I, K, V>(line: u64, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawRow {
            line,
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    fn require(&self, column: &str) -> Result<&str, RowError> {
        self.get(column).ok_or_else(|| RowError::MissingColumn {
            line: self.line,
            column: String::from(column),
        })
    }

    fn is_blank(&self) -> bool {
        self.values.values().all(|value| value.trim().is_empty())
    }
}

/// Read delimited text with a header row.
///
/// The header is checked against the schema before any row is returned. Short rows are
/// kept; their missing cells surface as row errors during [`parse`].
pub fn read_rows<R: Read>(reader: R, schema: &Schema) -> Result<Vec<RawRow>, Error> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let header: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|cell| {
            String::from_utf8_lossy(cell)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();
    schema.check_header(header.iter().map(String::as_str))?;

    let mut rows = vec![];
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let line = record.position().map_or(0, |position| position.line());
        let values = header
            .iter()
            .zip(record.iter())
            .map(|(column, cell)| {
                (column.clone(), String::from_utf8_lossy(cell).into_owned())
            });
        rows.push(RawRow::new(line, values));
    }
    Ok(rows)
}

/// The result of parsing: valid events plus everything that was skipped.
#[derive(Debug, Default, PartialEq)]
pub struct ParseOutcome {
    /// One event per (zone, date), in order of first appearance.
    pub events: Vec<PickupEvent>,
    pub errors: Vec<RowError>,
    /// Rows that repeated an existing (zone, date) without adding a stream.
    pub duplicates: usize,
    pub rows: usize,
}

/// Turn raw rows into pickup events.
///
/// Rows for a (zone, date) that was already seen are merged into the first event by
/// stream union. Bad rows are recorded and skipped.
pub fn parse<I: IntoIterator<Item = RawRow>>(rows: I, schema: &Schema) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut index: HashMap<(Zone, NaiveDate), usize> = HashMap::new();
    for row in rows {
        outcome.rows += 1;
        let event = match parse_row(&row, schema) {
            Ok(event) => event,
            Err(err) => {
                warn!("skipping row: {err}");
                outcome.errors.push(err);
                continue;
            }
        };
        let key = (event.zone.clone(), event.date);
        match index.get(&key) {
            Some(&position) => {
                let existing = &mut outcome.events[position];
                if existing.streams.contains(event.streams) {
                    warn!(
                        "line {}: duplicate pickup for {} on {}",
                        row.line, event.zone, event.date
                    );
                    outcome.duplicates += 1;
                } else {
                    debug!(
                        "line {}: merging {} into {} on {}",
                        row.line,
                        event.streams.label(),
                        event.zone,
                        event.date
                    );
                    existing.streams |= event.streams;
                }
            }
            None => {
                index.insert(key, outcome.events.len());
                outcome.events.push(event);
            }
        }
    }
    outcome
}

fn parse_row(row: &RawRow, schema: &Schema) -> Result<PickupEvent, RowError> {
    if row.is_blank() {
        return Err(RowError::Empty { line: row.line });
    }
    let zone_value = row.require(&schema.zone_column)?;
    let zone = Zone::parse(zone_value).map_err(|err| err.at(row.line))?;
    let date_value = row.require(&schema.date_column)?;
    let date = schema.parse_date(date_value).ok_or_else(|| RowError::Date {
        line: row.line,
        value: date_value.trim().to_string(),
    })?;
    let streams = match &schema.streams {
        StreamColumns::Flags(flags) => {
            let mut streams = StreamSet::none();
            for flag in flags {
                let value = row.require(&flag.column)?.trim();
                if !value.is_empty() && value != "0" {
                    streams |= StreamSet::from(flag.stream);
                }
            }
            streams
        }
        StreamColumns::Label(column) => {
            StreamSet::from_label(row.require(column)?).map_err(|err| err.at(row.line))?
        }
    };
    if streams.is_empty() {
        return Err(RowError::NoStreams { line: row.line });
    }
    Ok(PickupEvent {
        zone,
        date,
        streams,
    })
}
