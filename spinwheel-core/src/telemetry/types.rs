use serde::{Deserialize, Serialize};

/// One finished stream run, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreamTrace {
    /// Session label, e.g. "story" or "comparison".
    pub session: String,
    pub url: String,
    /// Response status, when the request got that far.
    pub status: Option<u16>,

    pub frames: u64,
    pub deltas: u64,
    pub source_updates: u64,
    /// Content lines dropped because they failed to decode.
    pub skipped_lines: u64,
    /// Bytes of an unterminated final frame dropped at end of stream.
    pub discarded_tail_bytes: u64,
    /// The session was reset by someone else while this stream was running.
    pub detached: bool,

    pub latency_ms: u64,

    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl StreamTrace {
    pub fn new(session: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    /// Also fills `status` when the error is a rejected stream request.
    pub fn error(mut self, err: &crate::error::SpinError) -> Self {
        if let crate::error::SpinError::StreamRequestFailed { status } = err {
            self.status = Some(*status);
        }
        self.error_kind = Some(err.kind().to_string());
        self.error_message = Some(err.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }
}
