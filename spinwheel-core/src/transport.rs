use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{CoreResult, SpinError};

/// Body of a streaming response, chunk by chunk as the transport delivers it.
pub type ByteStream = BoxStream<'static, CoreResult<Bytes>>;

/// An accepted streaming response: success status and a readable body.
pub struct SseResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl std::fmt::Debug for SseResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Opens a streaming POST. Implementations map a bad status or missing body to
/// `StreamRequestFailed` and network failures (including mid-body) to `StreamTransport`.
#[async_trait]
pub trait SseTransport: Send + Sync {
    async fn open_stream(&self, url: &str, body: &serde_json::Value) -> CoreResult<SseResponse>;
}

/// One scripted step of a [`ScriptedTransport`] body.
#[derive(Debug, Clone)]
pub enum ScriptedChunk {
    Data(Bytes),
    /// Fail the read at this point with a transport error.
    Fail(String),
}

/// Replays a fixed body for every request. Useful for tests and for
/// feeding recorded transcripts through the pipeline offline.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    status: u16,
    chunks: Vec<ScriptedChunk>,
}

impl ScriptedTransport {
    pub fn new(chunks: Vec<ScriptedChunk>) -> Self {
        Self {
            status: 200,
            chunks,
        }
    }

    /// Replay `body` cut into pieces of `chunk_size` bytes (at least one).
    pub fn from_body(body: impl AsRef<[u8]>, chunk_size: usize) -> Self {
        let chunks = body
            .as_ref()
            .chunks(chunk_size.max(1))
            .map(|c| ScriptedChunk::Data(Bytes::copy_from_slice(c)))
            .collect();
        Self::new(chunks)
    }

    /// Answer every request with this status (and no body if it is not a success).
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl SseTransport for ScriptedTransport {
    async fn open_stream(&self, _url: &str, _body: &serde_json::Value) -> CoreResult<SseResponse> {
        if !(200..300).contains(&self.status) || self.status == 204 {
            return Err(SpinError::StreamRequestFailed {
                status: self.status,
            });
        }
        let items: Vec<CoreResult<Bytes>> = self
            .chunks
            .iter()
            .map(|c| match c {
                ScriptedChunk::Data(b) => Ok(b.clone()),
                ScriptedChunk::Fail(msg) => Err(SpinError::StreamTransport(msg.clone())),
            })
            .collect();
        Ok(SseResponse {
            status: self.status,
            body: stream::iter(items).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_body_replays_in_chunks() {
        let t = ScriptedTransport::from_body("abcdefg", 3);
        let resp = t.open_stream("http://x", &serde_json::Value::Null).await.unwrap();
        assert_eq!(resp.status, 200);
        let parts: Vec<Bytes> = resp.body.map(|r| r.unwrap()).collect().await;
        assert_eq!(parts, vec![Bytes::from("abc"), Bytes::from("def"), Bytes::from("g")]);
    }

    #[tokio::test]
    async fn scripted_error_status_fails_request() {
        let t = ScriptedTransport::from_body("data: x\n\n", 4).with_status(503);
        let err = t.open_stream("http://x", &serde_json::Value::Null).await.unwrap_err();
        assert!(matches!(err, SpinError::StreamRequestFailed { status: 503 }));
    }
}
