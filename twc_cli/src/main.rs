use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twc_core::{conversion, row_parser::Schema, Config, RenderOptions};

#[derive(Debug, Parser)]
#[command(about = "Convert a waste pickup schedule into per-zone calendars")]
pub struct Arguments {
    /// the pickup schedule files, read in the given order
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
    /// the directory receiving `ics/` and `csv/`
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,
    /// a TOML file describing the input columns
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// put waste stream emojis in front of event summaries
    #[arg(long)]
    pub emoji: bool,
    /// the date format of the table's `Start Date` column
    #[arg(long, default_value = "%m-%d-%y")]
    pub table_date_format: String,
    /// log more, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl From<&Arguments> for RenderOptions {
    fn from(value: &Arguments) -> Self {
        RenderOptions {
            emoji: value.emoji,
            table_date_format: value.table_date_format.clone(),
        }
    }
}

impl Arguments {
    fn config(&self) -> Result<Config> {
        let schema = match &self.schema {
            Some(path) => Schema::load(path)
                .with_context(|| format!("loading schema {}", path.display()))?,
            None => Schema::default(),
        };
        Ok(Config {
            sources: self.sources.clone(),
            output_dir: self.output.clone(),
            schema,
            render: RenderOptions::from(self),
        })
    }

    fn log_filter(&self) -> EnvFilter {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

fn main() -> Result<ExitCode> {
    let args = Arguments::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_target(false)
        .init();

    let config = args.config()?;
    let report = conversion::run(&config)?;
    for failure in &report.zones_failed {
        warn!("{} was not written: {}", failure.zone, failure.reason);
    }
    if report.is_success() {
        info!("Finished writing calendars to {}", config.output_dir.display());
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
