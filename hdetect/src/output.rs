//! Renderers for `hd detect` and `hd report`.
//!
//! Detections are printed as one JSON object per line (or indented with
//! `pretty`); reports as indented JSON or a Markdown table. Output is plain
//! text; `hdetect-cli` adds colour to its own stderr summary.

use std::io::Write;

use serde::Serialize;

use crate::detection::Detection;
use crate::report::Report;

fn write_serialized<T: Serialize>(
    value: &T,
    pretty: bool,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(writer, "{rendered}")?;
    Ok(())
}

/// Print one aggregate [`Detection`] using the wire shape
/// `{"ok", "reasons", "severity", "patches"?}`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_detection(
    detection: &Detection,
    pretty: bool,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    write_serialized(detection, pretty, writer)
}

/// Print a [`Report`] as indented JSON, reason counts keyed by tag.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(report: &Report, writer: &mut dyn Write) -> anyhow::Result<()> {
    write_serialized(report, true, writer)
}

/// Print a [`Report`] as a Markdown outcome table followed by reason counts.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_markdown(report: &Report, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer, "# Detection report")?;
    writeln!(writer)?;
    writeln!(writer, "| Outcome | Count |")?;
    writeln!(writer, "|---|---:|")?;
    writeln!(writer, "| Total | {} |", report.total)?;
    writeln!(writer, "| OK | {} |", report.ok)?;
    writeln!(writer, "| Warn | {} |", report.warn)?;
    writeln!(writer, "| Block | {} |", report.block)?;
    writeln!(writer)?;
    writeln!(writer, "## Reasons")?;
    writeln!(writer)?;
    if report.reasons.is_empty() {
        writeln!(writer, "_No issues found._")?;
    } else {
        for (reason, count) in &report.reasons {
            writeln!(writer, "- `{reason}`: {count}")?;
        }
    }
    Ok(())
}
