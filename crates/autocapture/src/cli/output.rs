//! Rendering captured payloads for the terminal.

use crate::error::Result;
use crate::payload::CapturedPayload;

use super::OutputFormat;

const TABLE_HEADER: &str = "TIMESTAMP                 EVENT            TARGET     URL";

/// Header line for table output.
#[must_use]
pub fn table_header() -> &'static str {
    TABLE_HEADER
}

/// One table row.
#[must_use]
pub fn table_row(payload: &CapturedPayload) -> String {
    let target = payload
        .target
        .as_ref()
        .map_or("-", |t| t.selector.as_str());
    format!(
        "{:<25} {:<16} {:<10} {}",
        payload.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        payload.event,
        target,
        payload.meta.url
    )
}

/// One NDJSON line.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn ndjson_line(payload: &CapturedPayload) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Render a batch of payloads in `format`.
///
/// # Errors
///
/// Returns an error if a payload cannot be serialized.
pub fn render(payloads: &[CapturedPayload], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(payloads)?),
        OutputFormat::Ndjson => {
            let lines = payloads
                .iter()
                .map(ndjson_line)
                .collect::<Result<Vec<_>>>()?;
            Ok(lines.join("\n"))
        }
        OutputFormat::Table => {
            let mut out = String::from(TABLE_HEADER);
            for payload in payloads {
                out.push('\n');
                out.push_str(&table_row(payload));
            }
            Ok(out)
        }
    }
}
