//! Turning parsed frames into what the session should do with them.
//!
//! Contract:
//! - Each data line is interpreted on its own; lines are never joined.
//! - An empty line or the `[DONE]` sentinel produces nothing. `[DONE]` is not end-of-stream.
//! - In a `sources` event every line is a comma separated URL list that replaces the
//!   session's sources.
//! - Anywhere else a line is a content payload: chat-completion chunk JSON when it starts
//!   with `{`, raw text otherwise.
//! - A line that fails to decode is logged and skipped; it never ends the stream.

use serde::Deserialize;

use crate::error::{CoreResult, SpinError};
use crate::sse::parser::ParsedEvent;

pub const DONE_SENTINEL: &str = "[DONE]";
pub const SOURCES_EVENT: &str = "sources";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretedEvent {
    /// Full replacement for the session's source list.
    SourcesReceived(Vec<String>),
    /// Non-empty text to append.
    DeltaReceived(String),
}

impl InterpretedEvent {
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::DeltaReceived(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Events from one frame plus how many of its lines failed to decode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Interpreted {
    pub events: Vec<InterpretedEvent>,
    pub skipped: usize,
}

pub fn interpret(event: &ParsedEvent) -> Interpreted {
    let mut out = Interpreted::default();
    for line in &event.data_lines {
        match interpret_line(&event.event_type, line) {
            Ok(Some(ev)) => out.events.push(ev),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(event_type = %event.event_type, error = %err, "skipping undecodable stream line");
                out.skipped += 1;
            }
        }
    }
    out
}

pub fn interpret_line(event_type: &str, line: &str) -> CoreResult<Option<InterpretedEvent>> {
    if line.is_empty() || line == DONE_SENTINEL {
        return Ok(None);
    }

    if event_type == SOURCES_EVENT {
        let sources = line
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(Some(InterpretedEvent::SourcesReceived(sources)));
    }

    let delta = if line.trim_start().starts_with('{') {
        extract_delta(line)?
    } else {
        Some(line.to_string())
    };
    Ok(delta
        .filter(|d| !d.is_empty())
        .map(InterpretedEvent::DeltaReceived))
}

// ---- Chat-completion chunk wire shape (only the parts we read) ----
#[derive(Deserialize)]
struct ChunkWire {
    #[serde(default)]
    choices: Vec<ChoiceWire>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    #[serde(default)]
    delta: Option<DeltaWire>,
}

#[derive(Deserialize)]
struct DeltaWire {
    #[serde(default)]
    content: Option<ContentWire>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentWire {
    Text(String),
    Parts(Vec<serde_json::Value>),
    Other(serde::de::IgnoredAny),
}

/// Text delta of a chat-completion chunk: `choices[0].delta.content`, either a string
/// or the concatenated string `text` fields of a list of parts.
pub fn extract_delta(payload: &str) -> CoreResult<Option<String>> {
    let chunk: ChunkWire = serde_json::from_str(payload)
        .map_err(|e| SpinError::FramePayloadDecode(e.to_string()))?;

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content);

    Ok(match content {
        Some(ContentWire::Text(text)) => Some(text),
        Some(ContentWire::Parts(parts)) => {
            let text: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            (!text.is_empty()).then_some(text)
        }
        Some(ContentWire::Other(_)) | None => None,
    })
}
