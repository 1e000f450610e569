use crate::output::OutputFormatter;
use crate::reading::Reading;
use serde::Serialize;

/// One compact JSON object per reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

#[derive(Serialize)]
struct Record<'a> {
    name: &'a str,
    #[serde(flatten)]
    reading: &'a Reading,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, reading: &Reading, name: &str) -> String {
        serde_json::to_string(&Record { name, reading }).expect("reading serializes to JSON")
    }
}
