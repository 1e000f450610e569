//! Core application runner (business logic) for `mijia-listener`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit codes
//! so it can be tested deterministically.

use crate::address::SensorAddress;
use crate::alias::{Alias, AliasMap};
use crate::backend::{Backend, Bluetooth, ScanError, ToolsConfig};
use crate::discovery::{self, DEFAULT_SCAN_DURATION};
use crate::output::{OutputFormat, OutputFormatter};
use crate::reading::TemperatureUnit;
use crate::retrieval::{self, RetrievalConfig};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Read Xiaomi Mijia LYWSD03MMC thermometers over Bluetooth LE.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Bluetooth backend to use
    #[arg(long, default_value_t, value_enum, global = true)]
    pub backend: Backend,

    /// Run hcitool and gatttool through sudo
    #[arg(long, global = true)]
    pub sudo: bool,

    /// Path of the hcitool binary
    #[arg(long, default_value = "hcitool", global = true)]
    pub hcitool: PathBuf,

    /// Path of the gatttool binary
    #[arg(long, default_value = "gatttool", global = true)]
    pub gatttool: PathBuf,

    /// Specify human-readable alias for a sensor.
    /// Format: --alias A4:C1:38:0B:2E:01=Kitchen
    #[arg(long = "alias", value_parser = crate::alias::parse_alias, value_name = "ALIAS", global = true)]
    pub aliases: Vec<Alias>,

    /// Verbose output, log every attempt
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan for nearby sensors and print their addresses
    Scan(ScanArgs),
    /// Read temperature, humidity and battery level
    Read(ReadArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Scan duration in seconds
    #[arg(long, default_value_t = DEFAULT_SCAN_DURATION.as_secs())]
    pub duration: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Sensors to read, one after another. Scans for sensors when omitted.
    #[arg(value_name = "ADDRESS")]
    pub addresses: Vec<SensorAddress>,

    /// Report temperature in Fahrenheit
    #[arg(short = 'F', long)]
    pub fahrenheit: bool,

    /// Give up on a sensor after this many minutes
    #[arg(long, default_value_t = 2.0)]
    pub timeout_minutes: f64,

    /// Seconds between connection attempts
    #[arg(long, default_value_t = 20)]
    pub interval: u64,

    /// Output format
    #[arg(long, default_value_t, value_enum)]
    pub format: OutputFormat,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "mijia_measurement")]
    pub influxdb_measurement: String,

    /// Scan duration in seconds when no address is given
    #[arg(long, default_value_t = DEFAULT_SCAN_DURATION.as_secs())]
    pub scan_duration: u64,
}

impl Options {
    /// Settings for the command-line backend.
    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            sudo: self.sudo,
            hcitool: self.hcitool.clone(),
            gatttool: self.gatttool.clone(),
            ..ToolsConfig::default()
        }
    }
}

impl ReadArgs {
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig::from_minutes(self.timeout_minutes)
            .with_interval(Duration::from_secs(self.interval))
    }

    pub fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_fahrenheit_flag(self.fahrenheit)
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Some sensors were read, but not all of them
    #[error("{failed} of {total} sensor(s) returned no data")]
    Incomplete { failed: usize, total: usize },
}

/// Run the selected command, writing results to `out` and per-sensor failures to `err`.
///
/// - `scan` writes one address per line, followed by its alias when one is configured.
/// - `read` retrieves the given sensors strictly one after another. A sensor that
///   returns no data is reported on `err` and the remaining sensors are still read.
pub async fn run_with_io(
    options: Options,
    bluetooth: &dyn Bluetooth,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let aliases: AliasMap = crate::alias::to_map(&options.aliases);

    match options.command {
        Command::Scan(args) => scan(&args, bluetooth, &aliases, out).await,
        Command::Read(args) => read(&args, bluetooth, &aliases, out, err).await,
    }
}

async fn scan(
    args: &ScanArgs,
    bluetooth: &dyn Bluetooth,
    aliases: &AliasMap,
    out: &mut dyn Write,
) -> Result<(), RunError> {
    let sensors = discovery::scan(bluetooth, Duration::from_secs(args.duration)).await?;

    for address in sensors {
        match aliases.get(&address) {
            Some(name) => writeln!(out, "{address}\t{name}")?,
            None => writeln!(out, "{address}")?,
        }
    }

    Ok(())
}

async fn read(
    args: &ReadArgs,
    bluetooth: &dyn Bluetooth,
    aliases: &AliasMap,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let addresses = if args.addresses.is_empty() {
        let found = discovery::scan(bluetooth, Duration::from_secs(args.scan_duration)).await?;
        if found.is_empty() {
            warn!("no sensors found");
        }
        found
    } else {
        args.addresses.clone()
    };

    let formatter: Box<dyn OutputFormatter> = args.format.formatter(&args.influxdb_measurement);
    let config = args.retrieval_config();
    let unit = args.unit();

    let mut failed = 0;
    for address in &addresses {
        let name = crate::alias::resolve_name(address, aliases);
        match retrieval::get_data(bluetooth, *address, unit, &config).await {
            Ok(reading) => {
                writeln!(out, "{}", formatter.format(&reading, &name))?;
                out.flush()?;
            }
            Err(e) => {
                failed += 1;
                error!(%address, "{e}");
                writeln!(err, "{name}: {e}")?;
            }
        }
    }

    if failed > 0 {
        return Err(RunError::Incomplete {
            failed,
            total: addresses.len(),
        });
    }

    Ok(())
}
