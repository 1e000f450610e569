//! Output formatters for sensor readings.
//!
//! Each reading becomes one line of output: plain text for people, JSON for
//! scripts, or InfluxDB line protocol for Telegraf-style collectors.

pub mod influxdb;
pub mod json;
pub mod text;

use crate::reading::Reading;

pub use influxdb::InfluxDbFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

/// Trait for formatting readings into output lines.
pub trait OutputFormatter: Send + Sync {
    /// Format a reading of the sensor known as `name`.
    fn format(&self, reading: &Reading, name: &str) -> String;
}

/// Output formats selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Influxdb,
}

impl OutputFormat {
    /// Build the formatter; `measurement` is only used by InfluxDB output.
    pub fn formatter(self, measurement: &str) -> Box<dyn OutputFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::Influxdb => Box::new(InfluxDbFormatter::new(measurement.to_string())),
        }
    }
}
