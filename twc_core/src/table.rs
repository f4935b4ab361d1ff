//! Renders a zone schedule as a CSV table that calendar and spreadsheet tools can import.

use std::fmt::Write;

use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::{
    conversion::RenderOptions,
    error::{Error, SerializationError},
    pickup::{StreamSet, ZoneSchedule},
};

pub static HEADER: [&str; 4] = ["Subject", "Start Date", "All Day Event", "Description"];
static ALL_DAY: &str = "TRUE";
static DESCRIPTION_SEPARATOR: &str = " - See ";

/// Render the schedule as a table with a header row and one row per pickup.
pub fn serialize(
    schedule: &ZoneSchedule,
    options: &RenderOptions,
) -> Result<Vec<u8>, SerializationError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(vec![]);
    writer.write_record(HEADER)?;
    for pickup in &schedule.events {
        let start_date = format_date(pickup.date, &options.table_date_format)?;
        writer.write_record([
            pickup.subject(options.emoji).as_str(),
            start_date.as_str(),
            ALL_DAY,
            pickup.description().as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| SerializationError::Io(err.into_error()))
}

/// Format a date without panicking on a broken format string.
pub fn format_date(date: NaiveDate, format: &str) -> Result<String, SerializationError> {
    let mut formatted = String::new();
    write!(formatted, "{}", date.format(format))
        .map_err(|_| SerializationError::DateFormat(String::from(format)))?;
    Ok(formatted)
}

/// Read a table written by [`serialize`] back into its dates and streams.
pub fn parse_table(
    document: &[u8],
    date_format: &str,
) -> Result<Vec<(NaiveDate, StreamSet)>, Error> {
    let mut reader = ReaderBuilder::new().from_reader(document);
    let header = reader.headers()?.clone();
    let position = |name: &str| {
        header
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| Error::InvalidTable {
                line: 1,
                message: format!("missing column {name:?}"),
            })
    };
    let date_index = position(HEADER[1])?;
    let description_index = position(HEADER[3])?;

    let mut pickups = vec![];
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let invalid = |message: String| Error::InvalidTable { line, message };
        let date_value = record.get(date_index).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_value, date_format)
            .map_err(|err| invalid(format!("date {date_value:?}: {err}")))?;
        let description = record.get(description_index).unwrap_or_default();
        let label = description
            .split(DESCRIPTION_SEPARATOR)
            .next()
            .unwrap_or_default();
        let streams = StreamSet::from_label(label)
            .map_err(|err| invalid(format!("description: {err}")))?;
        pickups.push((date, streams));
    }
    Ok(pickups)
}
