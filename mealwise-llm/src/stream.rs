//! Incremental consumption of streamed provider bodies.
//!
//! The protocol clients decide what a frame means through a small interpreter
//! closure; everything else (buffering, chunk delivery, aggregation, error
//! handling) is shared here. Bodies are generic byte streams so the same code
//! runs against `reqwest` responses and against in-memory streams in tests.

use crate::framing::{EventBuffer, LineBuffer, SseEvent};
use crate::{ChunkSink, ProviderResult};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use mealwise_core::ProviderError;
use std::fmt::Display;

/// Meaning of one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to forward to the caller.
    Chunk(String),
    /// Valid frame without text (role headers, usage, pings).
    Skip,
    /// End of stream sentinel.
    Done,
    /// The provider reported an error inside the stream.
    Error(String),
}

/// Collects delivered chunks into the final response text.
struct Aggregate<'a> {
    provider: &'a str,
    sink: &'a mut dyn ChunkSink,
    text: String,
    chunks: usize,
}

impl<'a> Aggregate<'a> {
    fn new(provider: &'a str, sink: &'a mut dyn ChunkSink) -> Self {
        Self {
            provider,
            sink,
            text: String::new(),
            chunks: 0,
        }
    }

    fn deliver(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.sink.on_chunk(chunk);
        self.text.push_str(chunk);
        self.chunks += 1;
    }

    /// Final result once the stream ended normally.
    fn finish(self) -> ProviderResult<String> {
        tracing::debug!(
            provider = self.provider,
            chunks = self.chunks,
            bytes = self.text.len(),
            "Provider stream finished"
        );
        if self.text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.provider.to_string(),
            });
        }
        Ok(self.text)
    }

    /// Result once the provider reported an error mid-stream.
    ///
    /// Chunks already delivered stay delivered. A non-empty aggregate is still
    /// handed back so the caller can try to use it.
    fn finish_with_error(self, message: String) -> ProviderResult<String> {
        tracing::warn!(
            provider = self.provider,
            chunks = self.chunks,
            error = %message,
            "Provider reported an error inside the stream"
        );
        if self.text.trim().is_empty() {
            return Err(ProviderError::reported(self.provider, message));
        }
        Ok(self.text)
    }
}

/// Consume a newline-delimited JSON body.
///
/// Lines the interpreter rejects are logged and skipped. A trailing line
/// without terminator is still interpreted at end of stream.
pub async fn consume_ndjson<S, E, F>(
    provider: &str,
    body: S,
    sink: &mut dyn ChunkSink,
    mut interpret: F,
) -> ProviderResult<String>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Display,
    F: FnMut(&str) -> Result<Frame, String> + Send,
{
    let mut body = std::pin::pin!(body);
    let mut buffer = LineBuffer::new();
    let mut aggregate = Aggregate::new(provider, sink);

    while let Some(read) = body.next().await {
        let bytes = read.map_err(|e| ProviderError::transport(provider, e.to_string()))?;
        for line in buffer.push(&bytes) {
            match interpret_line(provider, &line, &mut interpret) {
                Some(Frame::Chunk(text)) => aggregate.deliver(&text),
                Some(Frame::Done) => return aggregate.finish(),
                Some(Frame::Error(message)) => return aggregate.finish_with_error(message),
                Some(Frame::Skip) | None => {}
            }
        }
    }

    if let Some(line) = buffer.finish() {
        match interpret_line(provider, &line, &mut interpret) {
            Some(Frame::Chunk(text)) => aggregate.deliver(&text),
            Some(Frame::Error(message)) => return aggregate.finish_with_error(message),
            Some(Frame::Done) | Some(Frame::Skip) | None => {}
        }
    }

    aggregate.finish()
}

fn interpret_line<F>(provider: &str, line: &str, interpret: &mut F) -> Option<Frame>
where
    F: FnMut(&str) -> Result<Frame, String>,
{
    match interpret(line) {
        Ok(frame) => Some(frame),
        Err(reason) => {
            tracing::warn!(provider, reason = %reason, "Skipping malformed stream line");
            None
        }
    }
}

/// Consume a server-sent events body.
///
/// Everything after the end sentinel is ignored, and an unterminated trailing
/// event is discarded without being interpreted.
pub async fn consume_sse<S, E, F>(
    provider: &str,
    body: S,
    sink: &mut dyn ChunkSink,
    mut interpret: F,
) -> ProviderResult<String>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Display,
    F: FnMut(&SseEvent) -> Result<Frame, String> + Send,
{
    let mut body = std::pin::pin!(body);
    let mut buffer = EventBuffer::new();
    let mut aggregate = Aggregate::new(provider, sink);

    while let Some(read) = body.next().await {
        let bytes = read.map_err(|e| ProviderError::transport(provider, e.to_string()))?;
        for event in buffer.push(&bytes) {
            match interpret(&event) {
                Ok(Frame::Chunk(text)) => aggregate.deliver(&text),
                Ok(Frame::Skip) => {}
                Ok(Frame::Done) => {
                    let discarded = buffer.finish();
                    if discarded > 0 {
                        tracing::debug!(provider, discarded, "Ignoring data after end of stream");
                    }
                    return aggregate.finish();
                }
                Ok(Frame::Error(message)) => return aggregate.finish_with_error(message),
                Err(reason) => {
                    tracing::warn!(provider, reason = %reason, "Skipping malformed stream event");
                }
            }
        }
    }

    let discarded = buffer.finish();
    if discarded > 0 {
        tracing::debug!(provider, discarded, "Discarding unterminated trailing event");
    }
    aggregate.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        let owned: Vec<Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    fn ndjson_frame(line: &str) -> Result<Frame, String> {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Ok(Frame::Error(err.to_string()));
        }
        if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
            return Ok(Frame::Done);
        }
        Ok(value
            .get("text")
            .and_then(|t| t.as_str())
            .map(|t| Frame::Chunk(t.to_string()))
            .unwrap_or(Frame::Skip))
    }

    fn sse_frame(event: &SseEvent) -> Result<Frame, String> {
        if event.data == "[DONE]" {
            return Ok(Frame::Done);
        }
        ndjson_frame(&event.data)
    }

    #[tokio::test]
    async fn test_ndjson_split_lines_and_malformed_line() {
        let mut chunks: Vec<String> = Vec::new();
        let mut sink = |c: &str| chunks.push(c.to_string());
        let result = consume_ndjson(
            "test",
            body(&["{\"text\":\"Hel", "lo\"}\nnot json\n{\"text\":\" world\"}\n", "{\"done\":true}\n"]),
            &mut sink,
            ndjson_frame,
        )
        .await
        .unwrap();
        assert_eq!(result, "Hello world");
        assert_eq!(chunks, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_ndjson_trailing_line_without_newline() {
        let mut sink = |_: &str| {};
        let result = consume_ndjson("test", body(&["{\"text\":\"a\"}\n{\"text\":\"b\"}"]), &mut sink, ndjson_frame)
            .await
            .unwrap();
        assert_eq!(result, "ab");
    }

    #[tokio::test]
    async fn test_ndjson_empty_aggregate_is_error() {
        let mut sink = |_: &str| {};
        let err = consume_ndjson("test", body(&["{\"done\":true}\n"]), &mut sink, ndjson_frame)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_sse_sentinel_discards_trailing_partial() {
        let mut chunks: Vec<String> = Vec::new();
        let mut sink = |c: &str| chunks.push(c.to_string());
        let result = consume_sse(
            "test",
            body(&["data: {\"text\":\"x\"}\n\ndata: [DONE]\n\ndata: {\"text\":\"y"]),
            &mut sink,
            sse_frame,
        )
        .await
        .unwrap();
        assert_eq!(result, "x");
        assert_eq!(chunks, vec!["x"]);
    }

    #[tokio::test]
    async fn test_sse_unterminated_tail_without_sentinel() {
        let mut sink = |_: &str| {};
        let result = consume_sse(
            "test",
            body(&["data: {\"text\":\"x\"}\n\ndata: {\"text\":\"broken"]),
            &mut sink,
            sse_frame,
        )
        .await
        .unwrap();
        assert_eq!(result, "x");
    }

    #[tokio::test]
    async fn test_sse_error_event_keeps_delivered_chunks() {
        let mut chunks: Vec<String> = Vec::new();
        let mut sink = |c: &str| chunks.push(c.to_string());
        let result = consume_sse(
            "test",
            body(&["data: {\"text\":\"part\"}\n\n", "data: {\"error\":\"overloaded\"}\n\n", "data: {\"text\":\"never\"}\n\n"]),
            &mut sink,
            sse_frame,
        )
        .await
        .unwrap();
        assert_eq!(result, "part");
        assert_eq!(chunks, vec!["part"]);
    }

    #[tokio::test]
    async fn test_sse_error_event_first_is_fatal() {
        let mut sink = |_: &str| {};
        let err = consume_sse(
            "test",
            body(&["data: {\"error\":\"overloaded\"}\n\n"]),
            &mut sink,
            sse_frame,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Reported { message, .. } if message == "overloaded"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\":\"x\"}\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut sink = |_: &str| {};
        let err = consume_sse("test", stream::iter(parts), &mut sink, sse_frame)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
    }
}
