//! Frame splitting: raw body bytes in, complete SSE event frames out.
//!
//! A frame is complete only once its blank-line terminator has arrived: a
//! line ending (`\n` or `\r\n`) directly followed by another one. Whatever follows the last terminator stays
//! buffered until the next chunk. Text still buffered when the body ends
//! never became a frame and is dropped.
//!
//! Splitting works on bytes and decodes each finished frame on its own, so
//! a multi-byte UTF-8 character cut in half by a chunk boundary is never
//! decoded in halves.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};

use crate::error::CoreResult;

/// A `\n` this close to the end of the buffer may still turn out to start a
/// blank line once more bytes arrive, so the next scan begins here.
const DELIMITER_OVERLAP: usize = 2;

#[derive(Debug, Default)]
pub struct FrameSplitter {
    buf: Vec<u8>,
    scan_from: usize,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk and return every frame it completed, in order.
    /// After this returns, the buffer holds no complete terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut from = self.scan_from;
        while let Some((frame_end, delim_end)) = find_frame_delimiter(&self.buf, start, from) {
            frames.push(String::from_utf8_lossy(&self.buf[start..frame_end]).into_owned());
            start = delim_end;
            from = start;
        }

        self.buf.drain(..start);
        self.scan_from = self.buf.len().saturating_sub(DELIMITER_OVERLAP);
        frames
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// End of input. Drops the unterminated remainder and returns its size in bytes.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buf.len();
        self.buf.clear();
        self.scan_from = 0;
        discarded
    }
}

/// Leftmost blank line in `buf[start..]`, looking at `\n` bytes from `from` on.
/// Any mix of `\n` and `\r\n` counts. Returns (frame end, delimiter end).
fn find_frame_delimiter(buf: &[u8], start: usize, from: usize) -> Option<(usize, usize)> {
    let mut i = from.max(start);
    while let Some(rel) = buf[i..].iter().position(|&b| b == b'\n') {
        let lf = i + rel;
        let delim_end = match buf.get(lf + 1..) {
            Some([b'\n', ..]) => Some(lf + 2),
            Some([b'\r', b'\n', ..]) => Some(lf + 3),
            _ => None,
        };
        if let Some(end) = delim_end {
            let frame_end = if lf > start && buf[lf - 1] == b'\r' { lf - 1 } else { lf };
            return Some((frame_end, end));
        }
        i = lf + 1;
    }
    None
}

/// Lazily turns a body byte stream into a stream of frames.
///
/// Finite and single-use: it ends when the body ends, and a transport error
/// is yielded once and then ends the stream.
pub struct FrameStream<S> {
    inner: S,
    splitter: FrameSplitter,
    pending: VecDeque<String>,
    finished: bool,
    discarded_tail: usize,
}

impl<S> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            splitter: FrameSplitter::new(),
            pending: VecDeque::new(),
            finished: false,
            discarded_tail: 0,
        }
    }

    /// Bytes of unterminated trailing text dropped when the body ended.
    pub fn discarded_tail(&self) -> usize {
        self.discarded_tail
    }
}

impl<S> Stream for FrameStream<S>
where
    S: Stream<Item = CoreResult<Bytes>> + Unpin,
{
    type Item = CoreResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let frames = this.splitter.push(&chunk);
                    this.pending.extend(frames);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    this.discarded_tail = this.splitter.finish();
                    if this.discarded_tail > 0 {
                        tracing::debug!(
                            bytes = this.discarded_tail,
                            "discarding unterminated trailing frame"
                        );
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
