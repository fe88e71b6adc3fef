//! Server-Sent Events (SSE) framing for streaming chat completions.
//!
//! The chat completions endpoint streams `data: <json>` events separated by blank lines and
//! terminates with `data: [DONE]`.  This module turns the raw HTTP byte stream into a stream of
//! `data` payloads; interpreting those payloads is left to the client.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::{Error, Result};

/// Payload that marks the end of a completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Process a stream of bytes into a stream of SSE `data` payloads.
///
/// Events may be split across arbitrary byte boundaries, including in the middle of a UTF-8
/// sequence.  Comment lines (`:`) and events without a `data` field are skipped.  The stream
/// ends after the `[DONE]` marker or when the byte stream ends; a trailing event without its
/// terminating blank line is still delivered.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    frame_events(stream)
}

/// Frame an already error-mapped byte stream into `data` payloads.
pub(crate) fn frame_events<S>(stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        Some((stream, buffer)),
        move |state| async move {
            let (mut stream, mut buffer) = state?;
            loop {
                // First check if we have a complete event in the buffer
                if let Some(end) = find_event_end(&buffer) {
                    let event: Vec<u8> = buffer.drain(..end + 2).collect();
                    match parse_event(&event[..end]) {
                        Ok(Some(data)) if data == DONE_MARKER => return None,
                        Ok(Some(data)) => return Some((Ok(data), Some((stream, buffer)))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), Some((stream, buffer)))),
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend(bytes.iter().filter(|b| **b != b'\r')),
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        // End of stream
                        let trailing = std::mem::take(&mut buffer);
                        return match parse_event(&trailing) {
                            Ok(Some(data)) if data == DONE_MARKER => None,
                            Ok(Some(data)) => Some((Ok(data), None)),
                            Ok(None) => None,
                            Err(e) => Some((Err(e), None)),
                        };
                    }
                }
            }
        },
    )
}

/// Index of the blank line that terminates the first event in `buffer`.
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

/// Extract the `data` field of one event, joining multi-line data with newlines.
fn parse_event(event: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(event)?;
    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn collect(chunks: Vec<&'static [u8]>) -> Vec<Result<String>> {
        let stream = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk)))
                .collect::<Vec<_>>(),
        );
        frame_events(stream).collect().await
    }

    #[tokio::test]
    async fn parse_single_event() {
        let events = collect(vec![b"data: {\"a\":1}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn done_marker_ends_stream() {
        let events = collect(vec![b"data: one\n\ndata: [DONE]\n\ndata: ignored\n\n"]).await;
        let payloads: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(payloads, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn handle_split_event() {
        let events = collect(vec![b"data: hel", b"lo\n", b"\ndata: world\n\n"]).await;
        let payloads: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(payloads, vec!["hello".to_string(), "world".to_string()]);
    }

    #[tokio::test]
    async fn handle_utf8_split_across_chunks() {
        // "é" is 0xC3 0xA9
        let events = collect(vec![b"data: caf\xC3", b"\xA9\n\n"]).await;
        assert_eq!(events[0].as_ref().unwrap(), "café");
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        let events = collect(vec![b"data: one\r\n\r\ndata: two\r\n\r\n"]).await;
        let payloads: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn comments_and_dataless_events_are_skipped() {
        let events = collect(vec![b": keep-alive\n\nevent: ping\n\ndata: x\n\n"]).await;
        let payloads: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(payloads, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let events = collect(vec![b"data: first\n\ndata: last"]).await;
        let payloads: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(payloads, vec!["first".to_string(), "last".to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let events = collect(vec![b"data: \xFF\xFE\n\n"]).await;
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: before\n\n")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"data: after\n\n")),
        ]);
        let events: Vec<_> = frame_events(stream).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), "before");
        assert!(events[1].is_err());
    }
}
