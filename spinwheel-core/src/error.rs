use thiserror::Error;

/// Core error type for spinwheel.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum SpinError {
    /// The streaming endpoint answered with a non-success status, or with no body to read.
    #[error("streaming request failed ({status})")]
    StreamRequestFailed { status: u16 },

    /// Network failure while sending the streaming request or reading its body.
    #[error("stream transport error: {0}")]
    StreamTransport(String),

    #[error("no complete frame within {idle_ms}ms")]
    StreamTimeout { idle_ms: u64 },

    /// One content line could not be decoded. Recoverable: the line is skipped.
    #[error("frame payload decode error: {0}")]
    FramePayloadDecode(String),

    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpinError {
    /// Stable short name for logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamRequestFailed { .. } => "stream_request_failed",
            Self::StreamTransport(_) => "stream_transport",
            Self::StreamTimeout { .. } => "stream_timeout",
            Self::FramePayloadDecode(_) => "frame_payload_decode",
            Self::RequestFailed { .. } => "request_failed",
            Self::Unavailable(_) => "unavailable",
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, SpinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_request_failed_carries_status() {
        let err = SpinError::StreamRequestFailed { status: 502 };
        assert_eq!(err.to_string(), "streaming request failed (502)");
        assert_eq!(err.kind(), "stream_request_failed");
    }

    #[test]
    fn anyhow_converts_to_other() {
        let err: SpinError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, SpinError::Other(_)));
        assert_eq!(err.kind(), "other");
    }
}
