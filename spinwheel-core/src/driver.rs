//! Stream driver: one streaming POST pumped through
//! splitter → parser → interpreter → session.
//!
//! Contract:
//! - Before the request goes out the session is reset and the busy counter incremented.
//! - The busy counter is decremented exactly once on every exit, panics included.
//! - The stream ends when the body ends. `[DONE]` lines are skipped, they do not stop the loop.
//! - A line that fails to decode is skipped; bad status, transport failure and idle
//!   timeout end the run with an error. Text accumulated before the failure stays.
//! - If the session is reset by someone else mid-stream, the driver stops writing and
//!   detaches from the body.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::field::Empty;
use tracing_futures::Instrument;

use crate::busy::BusyCounter;
use crate::config::StreamCfg;
use crate::error::{CoreResult, SpinError};
use crate::session::{Session, SessionWriter};
use crate::sse::{FrameStream, InterpretedEvent, interpret, parse_frame};
use crate::telemetry::{self, StreamTrace};
use crate::transport::SseTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Longest wait for the next complete frame. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    pub max_prefix_strips: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&StreamCfg::default())
    }
}

impl From<&StreamCfg> for StreamSettings {
    fn from(cfg: &StreamCfg) -> Self {
        Self {
            idle_timeout: (cfg.idle_timeout_ms > 0).then(|| Duration::from_millis(cfg.idle_timeout_ms)),
            max_prefix_strips: cfg.max_prefix_strips,
        }
    }
}

/// What one successful run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub status: u16,
    pub frames: u64,
    /// Deltas applied to the session.
    pub deltas: u64,
    pub source_updates: u64,
    pub skipped_lines: u64,
    pub discarded_tail_bytes: u64,
    /// The session was reset elsewhere and the rest of the body was abandoned.
    pub detached: bool,
}

#[derive(Clone)]
pub struct StreamDriver {
    transport: Arc<dyn SseTransport>,
    busy: BusyCounter,
    settings: StreamSettings,
}

impl std::fmt::Debug for StreamDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDriver")
            .field("busy", &self.busy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl StreamDriver {
    pub fn new(transport: Arc<dyn SseTransport>, busy: BusyCounter, settings: StreamSettings) -> Self {
        Self {
            transport,
            busy,
            settings,
        }
    }

    pub fn busy(&self) -> &BusyCounter {
        &self.busy
    }

    /// Reset `session`, POST `body` as JSON to `url`, and fold the streamed events into it.
    /// No retry: callers re-invoke `run` to try again.
    pub async fn run<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        session: &Session,
    ) -> CoreResult<StreamSummary> {
        let _busy = self.busy.enter();
        let writer = session.reset();

        let span = tracing::info_span!(
            "sse_stream",
            sse.session = session.label(),
            http.url = url,
            http.status = Empty,
            sse.frames = Empty,
            sse.deltas = Empty,
            error.kind = Empty,
        );
        let started = Instant::now();
        let mut summary = StreamSummary::default();
        let result = match serde_json::to_value(body) {
            Ok(body) => {
                self.pump(url, &body, &writer, &mut summary)
                    .instrument(span.clone())
                    .await
            }
            Err(e) => Err(SpinError::Other(e.into())),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        span.record(telemetry::KEY_FRAMES, summary.frames);
        span.record(telemetry::KEY_DELTAS, summary.deltas);
        let mut trace = StreamTrace {
            status: (summary.status != 0).then_some(summary.status),
            frames: summary.frames,
            deltas: summary.deltas,
            source_updates: summary.source_updates,
            skipped_lines: summary.skipped_lines,
            discarded_tail_bytes: summary.discarded_tail_bytes,
            detached: summary.detached,
            ..StreamTrace::new(session.label(), url)
        }
        .latency_ms(latency_ms);

        match &result {
            Ok(()) => tracing::info!(
                parent: &span,
                frames = summary.frames,
                deltas = summary.deltas,
                skipped = summary.skipped_lines,
                detached = summary.detached,
                latency_ms,
                "stream finished"
            ),
            Err(err) => {
                span.record(telemetry::KEY_ERROR_KIND, err.kind());
                if let SpinError::StreamRequestFailed { status } = err {
                    span.record(telemetry::KEY_STATUS, *status);
                }
                tracing::error!(parent: &span, error = %err, latency_ms, "streaming failed");
                trace = trace.error(err);
            }
        }
        telemetry::emit_stream(trace);

        result.map(|()| summary)
    }

    async fn pump(
        &self,
        url: &str,
        body: &serde_json::Value,
        writer: &SessionWriter,
        summary: &mut StreamSummary,
    ) -> CoreResult<()> {
        let resp = self.transport.open_stream(url, body).await?;
        summary.status = resp.status;
        tracing::Span::current().record(telemetry::KEY_STATUS, resp.status);

        let mut frames = FrameStream::new(resp.body);
        while let Some(frame) = self.next_frame(&mut frames).await? {
            summary.frames += 1;
            let interpreted = interpret(&parse_frame(&frame, self.settings.max_prefix_strips));
            summary.skipped_lines += interpreted.skipped as u64;

            for event in interpreted.events {
                let applied = match event {
                    InterpretedEvent::SourcesReceived(list) => {
                        let ok = writer.apply_sources(list);
                        summary.source_updates += u64::from(ok);
                        ok
                    }
                    InterpretedEvent::DeltaReceived(text) => {
                        let ok = writer.apply_delta(&text);
                        summary.deltas += u64::from(ok);
                        ok
                    }
                };
                if !applied {
                    tracing::debug!("session was reset by a newer stream; detaching");
                    summary.detached = true;
                    return Ok(());
                }
            }
        }
        summary.discarded_tail_bytes = frames.discarded_tail() as u64;
        Ok(())
    }

    async fn next_frame<S>(&self, frames: &mut FrameStream<S>) -> CoreResult<Option<String>>
    where
        S: Stream<Item = CoreResult<Bytes>> + Unpin,
    {
        let next = match self.settings.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, frames.next())
                .await
                .map_err(|_| SpinError::StreamTimeout {
                    idle_ms: limit.as_millis() as u64,
                })?,
            None => frames.next().await,
        };
        next.transpose()
    }
}
