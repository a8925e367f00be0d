//! Console rendering of samples.

use std::fmt::Write;

use crate::value::Sample;

/// Items per block used by the binary.
pub const DEFAULT_ITEMS_PER_LINE: usize = 5;

/// Render `sample` as blocks of aligned header and value lines.
///
/// Every cell is left-justified to the widest header or value in the sample.
/// Each block holds up to `max_items_per_line` cells joined by `" | "` and is
/// followed by a dashed line as wide as its header line.
pub fn format_sample(sample: &Sample, max_items_per_line: usize) -> String {
    let cells: Vec<(&str, String)> = sample
        .iter()
        .map(|(tag, value)| (tag, value.to_string()))
        .collect();

    let width = cells
        .iter()
        .map(|(tag, value)| tag.chars().count().max(value.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for block in cells.chunks(max_items_per_line.max(1)) {
        let header_line = block
            .iter()
            .map(|(tag, _)| format!("{:<width$}", tag))
            .collect::<Vec<_>>()
            .join(" | ");
        let value_line = block
            .iter()
            .map(|(_, value)| format!("{:<width$}", value))
            .collect::<Vec<_>>()
            .join(" | ");
        let dashes = "-".repeat(header_line.chars().count());

        let _ = writeln!(out, "{header_line}");
        let _ = writeln!(out, "{value_line}");
        let _ = writeln!(out, "{dashes}");
    }
    out
}
