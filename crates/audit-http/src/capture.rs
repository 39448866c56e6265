use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use audit_log::{LogEntry, Writer};
use audit_policy::Verbosity;
use axum::body::Body;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use http_body::{Frame, SizeHint};

use crate::debounce::ErrorDebouncer;

/// Everything needed to complete and write an entry once the response is
/// done.
pub(crate) struct Finalizer {
    pub(crate) writer: Arc<Writer>,
    pub(crate) debouncer: Arc<ErrorDebouncer>,
    pub(crate) entry: LogEntry,
    pub(crate) verbosity: Verbosity,
}

impl Finalizer {
    fn finish(mut self, body: Option<BytesMut>) {
        self.entry.response_timestamp = Some(Utc::now());
        if let Some(body) = body {
            self.entry.raw_response_body = Some(body.to_vec());
        }
        self.entry.apply_verbosity(&self.verbosity);

        if let Err(err) = self.writer.write(&mut self.entry) {
            self.debouncer.report(&err);
        }
    }
}

/// Response body wrapper that forwards every frame unchanged and writes the
/// audit entry when the body ends, fails or is dropped.
///
/// Data frames are only copied when the resolved verbosity keeps the response
/// body; otherwise nothing is retained no matter how much is streamed.
pub struct CaptureBody {
    inner: Body,
    buffer: Option<BytesMut>,
    finalizer: Option<Finalizer>,
}

impl CaptureBody {
    pub(crate) fn new(inner: Body, finalizer: Finalizer) -> Self {
        let buffer = finalizer.verbosity.response.body.then(BytesMut::new);
        Self {
            inner,
            buffer,
            finalizer: Some(finalizer),
        }
    }

    /// Bytes of response body held for the audit entry so far.
    #[cfg(test)]
    fn retained(&self) -> usize {
        self.buffer.as_ref().map_or(0, BytesMut::len)
    }

    fn finish(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(self.buffer.take());
        }
    }
}

impl http_body::Body for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(buffer), Some(data)) = (this.buffer.as_mut(), frame.data_ref()) {
                    buffer.extend_from_slice(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_log::{MemorySink, WriterOptions};
    use audit_policy::Level;
    use http_body_util::BodyExt;

    const CHUNK: usize = 64 * 1024;
    const CHUNKS: usize = 32;

    fn streamed_body() -> Body {
        let chunks = (0..CHUNKS).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; CHUNK])));
        Body::from_stream(futures_util::stream::iter(chunks))
    }

    fn capture(level: Level, inner: Body) -> (CaptureBody, MemorySink) {
        let sink = MemorySink::new();
        let writer = Writer::new(
            sink.clone(),
            WriterOptions {
                default_policy_level: level,
                ..WriterOptions::default()
            },
        )
        .unwrap();
        let finalizer = Finalizer {
            writer: Arc::new(writer),
            debouncer: Arc::new(ErrorDebouncer::default()),
            entry: LogEntry::new("GET", "/v3/stream"),
            verbosity: Verbosity::for_level(level),
        };
        (CaptureBody::new(inner, finalizer), sink)
    }

    /// Drain `body`, returning the bytes forwarded and the most it ever held.
    async fn drain(body: &mut CaptureBody) -> (usize, usize) {
        let mut forwarded = 0;
        let mut peak = 0;
        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame.unwrap().into_data() {
                forwarded += data.len();
            }
            peak = peak.max(body.retained());
        }
        (forwarded, peak)
    }

    #[tokio::test]
    async fn metadata_level_retains_nothing_while_streaming() {
        let (mut body, sink) = capture(Level::Metadata, streamed_body());
        let (forwarded, peak) = drain(&mut body).await;

        assert_eq!(forwarded, CHUNK * CHUNKS);
        assert_eq!(peak, 0);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].get("responseBody").is_none());
        assert!(records[0].get("responseTimestamp").is_some());
    }

    #[tokio::test]
    async fn request_response_level_retains_whole_body() {
        let (mut body, _sink) = capture(Level::RequestResponse, streamed_body());
        let (forwarded, peak) = drain(&mut body).await;
        assert_eq!(forwarded, CHUNK * CHUNKS);
        assert_eq!(peak, CHUNK * CHUNKS);
    }

    #[tokio::test]
    async fn entry_is_written_once_even_after_drop() {
        let (mut body, sink) = capture(Level::Metadata, Body::from("{}"));
        drain(&mut body).await;
        drop(body);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn dropping_unread_body_still_writes_entry() {
        let (body, sink) = capture(Level::Metadata, Body::from("partial"));
        drop(body);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn size_hint_is_forwarded() {
        let (body, _sink) = capture(Level::Metadata, Body::from("12345"));
        assert_eq!(http_body::Body::size_hint(&body).exact(), Some(5));
        assert!(!http_body::Body::is_end_stream(&body));
    }
}
