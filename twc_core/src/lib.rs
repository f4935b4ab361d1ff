//! This crate converts a municipal waste pickup schedule into calendars.
//!
//! The schedule is a table keyed by collection zone and date. For every zone it renders an
//! iCalendar file with one all-day event per pickup and a CSV table that calendar and
//! spreadsheet tools can import. See [`conversion::run`] for the whole pipeline.

pub use ical;

pub mod calendar;
pub mod conversion;
pub mod error;
pub mod pickup;
pub mod row_parser;
pub mod sink;
pub mod table;
pub mod zone_grouper;

pub use conversion::{run, run_with_sink, Config, RenderOptions, RunReport};
pub use error::{Error, SchemaError, SerializationError};
