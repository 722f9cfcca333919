//! Frame parsing: one frame's text in, event type plus data lines out.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_EVENT_TYPE: &str = "message";

static NESTED_DATA_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*data:").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub event_type: String,
    /// Payloads of the frame's `data:` lines, in the frame's order.
    pub data_lines: Vec<String>,
}

/// Parse one frame. Lines that are neither `event:` nor `data:` are ignored;
/// the last `event:` line wins.
pub fn parse_frame(frame: &str, max_prefix_strips: usize) -> ParsedEvent {
    let mut event_type: Option<String> = None;
    let mut data_lines = Vec::new();

    for raw in frame.split(['\n', '\r']) {
        let line = raw.trim_end();
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(strip_data_prefix(rest, max_prefix_strips).to_string());
        }
    }

    ParsedEvent {
        event_type: event_type.unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
        data_lines,
    }
}

/// Payload of a `data:` line whose own `data:` has already been removed.
///
/// Drops the one optional space after the colon, then up to `max_strips`
/// nested `data:` markers left by upstream double encoding. Whitespace after
/// a nested marker is payload and is kept.
pub fn strip_data_prefix(rest: &str, max_strips: usize) -> &str {
    let mut payload = rest.strip_prefix(' ').unwrap_or(rest);
    for _ in 0..max_strips {
        match NESTED_DATA_PREFIX.find(payload) {
            Some(m) => payload = &payload[m.end()..],
            None => break,
        }
    }
    payload
}
