use crate::output::OutputFormatter;
use crate::reading::Reading;

/// One human-readable line per reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format(&self, reading: &Reading, name: &str) -> String {
        let label = if name == reading.address.to_string() {
            name.to_string()
        } else {
            format!("{name} ({})", reading.address)
        };

        format!(
            "{label}: {:.1}{}, humidity {}%, battery {}%",
            reading.temperature,
            reading.unit.symbol(),
            reading.humidity_level,
            reading.battery_level
        )
    }
}
