//! The conversion run: read the schedule, group it by zone and write two documents per zone.

use std::{fmt, fs::File, path::PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::{
    calendar,
    error::{Error, SerializationError},
    pickup::{Zone, ZoneSchedule},
    row_parser::{self, RawRow, RowError, Schema},
    sink::{DirectorySink, DocumentKind, Sink},
    table, zone_grouper,
};

/// How documents are rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Put the stream emojis in front of summaries.
    pub emoji: bool,
    /// chrono format of the `Start Date` column.
    pub table_date_format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            emoji: false,
            table_date_format: String::from("%m-%d-%y"),
        }
    }
}

impl RenderOptions {
    pub fn check(&self) -> Result<(), Error> {
        table::format_date(NaiveDate::MIN, &self.table_date_format)
            .map(|_| ())
            .map_err(|err| Error::Config(err.to_string()))
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Schedule files, read in this order.
    pub sources: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub schema: Schema,
    pub render: RenderOptions,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(sources: Vec<PathBuf>, output_dir: P) -> Self {
        Config {
            sources,
            output_dir: output_dir.into(),
            schema: Schema::default(),
            render: RenderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFailure {
    pub zone: Zone,
    pub reason: String,
}

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    pub rows_processed: usize,
    pub row_errors: Vec<RowError>,
    /// Repeated (zone, date) rows and events that were dropped.
    pub duplicates: usize,
    pub zones_succeeded: Vec<Zone>,
    pub zones_failed: Vec<ZoneFailure>,
}

impl RunReport {
    pub fn rows_skipped(&self) -> usize {
        self.row_errors.len()
    }

    /// A run succeeds when at least one zone was written completely.
    pub fn is_success(&self) -> bool {
        !self.zones_succeeded.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zones written, {} zones failed, {} rows processed, {} rows skipped, {} duplicates",
            self.zones_succeeded.len(),
            self.zones_failed.len(),
            self.rows_processed,
            self.rows_skipped(),
            self.duplicates
        )
    }
}

/// Convert the configured sources into `<output_dir>/ics` and `<output_dir>/csv`.
pub fn run(config: &Config) -> Result<RunReport, Error> {
    let mut sink = DirectorySink::new(&config.output_dir);
    run_with_sink(config, &mut sink)
}

/// Convert the configured sources and hand every document to `sink`.
///
/// Fails before anything is written when a source cannot be read, a header does not
/// match the schema or no row is valid. Once writing starts, a failing zone is
/// recorded in the report and the remaining zones proceed.
pub fn run_with_sink<S: Sink + ?Sized>(config: &Config, sink: &mut S) -> Result<RunReport, Error> {
    config.schema.validate()?;
    config.render.check()?;

    let mut rows: Vec<RawRow> = vec![];
    for path in &config.sources {
        info!("Parsing {}", path.display());
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let source_rows =
            row_parser::read_rows(file, &config.schema).map_err(|err| Error::Source {
                path: path.clone(),
                source: Box::new(err),
            })?;
        rows.extend(source_rows);
    }

    let outcome = row_parser::parse(rows, &config.schema);
    let mut report = RunReport {
        rows_processed: outcome.rows,
        row_errors: outcome.errors,
        duplicates: outcome.duplicates,
        ..RunReport::default()
    };
    if outcome.events.is_empty() {
        return Err(Error::NoValidRows {
            rows: report.rows_processed,
            skipped: report.rows_skipped(),
        });
    }

    let grouping = zone_grouper::group(outcome.events);
    report.duplicates += grouping.duplicates.len();
    for (zone, schedule) in grouping.schedules {
        info!("Writing {} ({} pickups)", zone, schedule.events.len());
        match write_zone(&schedule, &config.render, sink) {
            Ok(()) => report.zones_succeeded.push(zone),
            Err(reason) => {
                warn!("{zone} failed: {reason}");
                report.zones_failed.push(ZoneFailure { zone, reason });
            }
        }
    }
    info!("{report}");
    Ok(report)
}

/// Render both documents, then write them.
fn write_zone<S: Sink + ?Sized>(
    schedule: &ZoneSchedule,
    options: &RenderOptions,
    sink: &mut S,
) -> Result<(), String> {
    let render = || -> Result<(Vec<u8>, Vec<u8>), SerializationError> {
        Ok((
            calendar::serialize(schedule, options)?,
            table::serialize(schedule, options)?,
        ))
    };
    let (calendar, table) = render().map_err(|err| err.to_string())?;
    for (kind, document) in [
        (DocumentKind::Calendar, calendar),
        (DocumentKind::Table, table),
    ] {
        sink.write(&schedule.zone, kind, &document)
            .map_err(|err| format!("writing {} failed: {err}", kind.extension()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::sink::MemorySink;

    /// Fails every write for one zone.
    struct FailingSink {
        inner: MemorySink,
        failing: Zone,
    }

    impl Sink for FailingSink {
        fn write(&mut self, zone: &Zone, kind: DocumentKind, document: &[u8]) -> io::Result<()> {
            if *zone == self.failing {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.inner.write(zone, kind, document)
        }
    }

    fn write_source(directory: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = directory.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    static SCHEDULE: &str = "\
_id,Calendar,WeekStarting,GreenBin,Garbage,Recycling,YardWaste,ChristmasTree
1,Tuesday1,2024-04-02,T,T,0,0,0
2,Tuesday2,2024-04-09,T,0,T,0,0
3,Tuesday2,not a date,T,0,T,0,0
";

    #[test]
    fn test_run_with_sink() {
        let directory = tempfile::tempdir().unwrap();
        let source = write_source(&directory, "pickup-schedule-2024.csv", SCHEDULE);
        let config = Config::new(vec![source], directory.path().join("output"));
        let mut sink = MemorySink::default();
        let report = run_with_sink(&config, &mut sink).unwrap();

        assert!(report.is_success());
        assert_eq!(report.rows_processed, 3);
        assert_eq!(report.rows_skipped(), 1);
        assert_eq!(report.zones_succeeded.len(), 2);
        assert_eq!(sink.documents.len(), 4);
        assert_eq!(
            report.to_string(),
            "2 zones written, 0 zones failed, 3 rows processed, 1 rows skipped, 0 duplicates"
        );
    }

    #[test]
    fn test_run_isolates_failing_zone() {
        let directory = tempfile::tempdir().unwrap();
        let source = write_source(&directory, "pickup-schedule-2024.csv", SCHEDULE);
        let config = Config::new(vec![source], directory.path().join("output"));
        let failing = Zone::parse("Tuesday2").unwrap();
        let mut sink = FailingSink {
            inner: MemorySink::default(),
            failing: failing.clone(),
        };
        let report = run_with_sink(&config, &mut sink).unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.zones_succeeded,
            vec![Zone::parse("Tuesday1").unwrap()]
        );
        assert_eq!(report.zones_failed.len(), 1);
        assert_eq!(report.zones_failed[0].zone, failing);
        assert!(report.zones_failed[0].reason.contains("read-only"));
        assert_eq!(sink.inner.documents.len(), 2);
    }

    #[test]
    fn test_run_rejects_broken_date_format() {
        let directory = tempfile::tempdir().unwrap();
        let source = write_source(&directory, "pickup-schedule-2024.csv", SCHEDULE);
        let mut config = Config::new(vec![source], directory.path().join("output"));
        config.render.table_date_format = String::from("%Q");
        let mut sink = MemorySink::default();
        assert!(matches!(run_with_sink(&config, &mut sink), Err(Error::Config(_))));
        assert!(sink.documents.is_empty());
    }

    #[test]
    fn test_run_missing_source() {
        let directory = tempfile::tempdir().unwrap();
        let config = Config::new(
            vec![directory.path().join("missing.csv")],
            directory.path().join("output"),
        );
        assert!(matches!(
            run_with_sink(&config, &mut MemorySink::default()),
            Err(Error::Io { .. })
        ));
    }
}
