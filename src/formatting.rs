//! Per-destination rendering of log records.
//!
//! Every destination carries its own template and date format; this module
//! turns a record into the final line for one destination. Rendering never
//! fails: malformed templates and date formats degrade to a safe fallback
//! instead of erroring out of the logging path.

use crate::core::Record;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

/// Default line template, matching the classic `time - name - level - message`
/// console layout.
pub const DEFAULT_TEMPLATE: &str = "{timestamp} - {source} - {level} - {message}";

/// Compact template used by the notification-style destinations.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "{level}: {message}";

/// Default strftime date format.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders `record` through `template`.
///
/// Recognized placeholders: `{timestamp}`, `{source}`, `{level}`,
/// `{message}`, `{file}`, `{line}`. An unknown placeholder or an unclosed
/// brace degrades to the raw message with no template applied.
pub fn render(template: &str, date_format: &str, record: &Record) -> String {
    try_render(template, date_format, record).unwrap_or_else(|| record.message.to_string())
}

fn try_render(template: &str, date_format: &str, record: &Record) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open.find('}')?;
        let key = &after_open[..close];
        match key {
            "timestamp" => out.push_str(&format_timestamp(&record.timestamp, date_format)),
            "source" => out.push_str(&record.source),
            "level" => out.push_str(record.severity.as_str()),
            "message" => out.push_str(&record.message.to_string()),
            "file" => out.push_str(record.call_site.map(|c| c.file).unwrap_or("-")),
            "line" => match record.call_site {
                Some(call_site) => out.push_str(&call_site.line.to_string()),
                None => out.push('-'),
            },
            _ => return None,
        }
        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    Some(out)
}

/// Formats a timestamp with a strftime format string, falling back to
/// RFC 3339 when the format string itself is invalid.
pub fn format_timestamp(timestamp: &DateTime<Utc>, date_format: &str) -> String {
    let items: Vec<Item> = StrftimeItems::new(date_format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return timestamp.to_rfc3339();
    }
    timestamp
        .format_with_items(items.into_iter())
        .to_string()
}
