//! Streaming response primitives
//!
//! A response is produced incrementally: the producing side holds a
//! `StreamWriter` and appends chunks; the consuming side drains a
//! `ResponseBody`. A body is consume-once. `ResponseStream` tags a body
//! with the input text that produced it, which is what the correlation
//! check compares against the active request.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One increment of a streaming response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text delta
    pub text: String,
}

impl StreamChunk {
    /// Create a text chunk
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The receiver went away; nothing further can be appended
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response stream closed by receiver")]
pub struct StreamClosed;

/// Producer half of a response stream
#[derive(Debug, Clone)]
pub struct StreamWriter {
    tx: mpsc::Sender<StreamChunk>,
}

impl StreamWriter {
    /// Append one chunk, waiting for channel capacity.
    ///
    /// # Errors
    /// `StreamClosed` if the consuming side dropped the body.
    pub async fn send(&self, chunk: StreamChunk) -> Result<(), StreamClosed> {
        self.tx.send(chunk).await.map_err(|_| StreamClosed)
    }

    /// Append one text chunk
    ///
    /// # Errors
    /// `StreamClosed` if the consuming side dropped the body.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(StreamChunk::text(text)).await
    }
}

/// Consumer half of a response stream.
///
/// Dropping the body closes the channel, which the producer observes as
/// `StreamClosed` on its next append.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::Receiver<StreamChunk>,
}

impl ResponseBody {
    /// Create a writer/body pair with the given channel capacity
    #[must_use]
    pub fn channel(capacity: usize) -> (StreamWriter, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (StreamWriter { tx }, Self { rx })
    }

    /// A body that yields a single chunk and ends
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let (writer, body) = Self::channel(1);
        // Capacity 1 and no other sender: this cannot fail.
        let _ = writer.tx.try_send(StreamChunk::text(text));
        body
    }

    /// Receive the next chunk; `None` once the producer is done
    pub async fn next_chunk(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }

    /// Drain the body into a single string
    pub async fn collect_text(mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.rx.recv().await {
            out.push_str(&chunk.text);
        }
        out
    }
}

impl Stream for ResponseBody {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// A response body tagged with the input text that produced it.
///
/// Valid for delivery only while its origin equals the input of the
/// currently active request; a stream whose origin belongs to a superseded
/// request is stale and must be discarded.
#[derive(Debug)]
pub struct ResponseStream {
    origin: String,
    body: ResponseBody,
}

impl ResponseStream {
    /// Tag a body with its originating input text
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            origin: origin.into(),
            body,
        }
    }

    /// The input text this stream was produced for
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether this stream was produced for the given input
    #[inline]
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        self.origin == input
    }

    /// Unwrap into the chunk body
    #[inline]
    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

impl Stream for ResponseStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.body).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn writer_appends_and_body_drains() {
        let (writer, body) = ResponseBody::channel(4);

        writer.send_text("hello ").await.unwrap();
        writer.send_text("world").await.unwrap();
        drop(writer);

        assert_eq!(body.collect_text().await, "hello world");
    }

    #[tokio::test]
    async fn from_text_yields_single_chunk() {
        let mut body = ResponseBody::from_text("hi");
        assert_eq!(body.next_chunk().await, Some(StreamChunk::text("hi")));
        assert_eq!(body.next_chunk().await, None);
    }

    #[tokio::test]
    async fn dropped_body_closes_writer() {
        let (writer, body) = ResponseBody::channel(1);
        drop(body);

        let result = writer.send_text("ignored").await;
        assert_eq!(result, Err(StreamClosed));
    }

    #[tokio::test]
    async fn body_implements_stream() {
        let (writer, body) = ResponseBody::channel(4);
        writer.send_text("a").await.unwrap();
        writer.send_text("b").await.unwrap();
        drop(writer);

        let chunks: Vec<_> = body.collect().await;
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn response_stream_correlates_by_origin() {
        let stream = ResponseStream::new("what is x", ResponseBody::from_text("x is 1"));

        assert!(stream.matches("what is x"));
        assert!(!stream.matches("what is y"));
        assert_eq!(stream.origin(), "what is x");
        assert_eq!(stream.into_body().collect_text().await, "x is 1");
    }
}
