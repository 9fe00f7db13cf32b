//! Server-Sent Events (SSE) frame reassembly and parsing.
//!
//! The response body is a sequence of frames separated by a blank line:
//! ```text
//! data: {"type":"chunk","content":"Hel"}
//!
//! data: {"type":"chunk","content":"lo"}
//!
//! data: {"type":"done","content":"Hello","tokens_used":2,"model":"m1"}
//! ```
//!
//! Frame boundaries have nothing to do with network chunk boundaries, so
//! decoded text is accumulated in a [`FrameBuffer`] and only complete frames
//! are handed to the parser.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::model::{Frame, StreamEvent};
use crate::options::StreamOptions;
use crate::session::StreamSession;

/// Separator between two frames once line endings are normalized.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Accumulates decoded text and splits it into complete frames.
///
/// CRLF and bare CR line endings are normalized to LF as text is pushed, so
/// the delimiter check only has to look for `"\n\n"`.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: String,
    // A CR ended the previous push; an LF at the start of the next one belongs to it.
    after_cr: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every frame completed by it, in order.
    ///
    /// Blank frames (e.g. from runs of empty lines) are skipped.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        // The tail holds no delimiter, except possibly its first half.
        let mut scan = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        self.append_normalized(text);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[scan..].find(FRAME_DELIMITER) {
            let end = scan + offset;
            let frame = &self.buffer[start..end];
            if !frame.trim().is_empty() {
                frames.push(frame.to_string());
            }
            start = end + FRAME_DELIMITER.len();
            scan = start;
        }
        self.buffer.drain(..start);
        frames
    }

    /// The unterminated tail waiting for more input.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Take the unterminated tail, leaving the buffer empty.
    pub fn take_remainder(&mut self) -> String {
        self.after_cr = false;
        std::mem::take(&mut self.buffer)
    }

    fn append_normalized(&mut self, text: &str) {
        if !self.after_cr && !text.contains('\r') {
            self.buffer.push_str(text);
            return;
        }
        for c in text.chars() {
            match c {
                '\r' => {
                    self.buffer.push('\n');
                    self.after_cr = true;
                }
                '\n' if self.after_cr => self.after_cr = false,
                c => {
                    self.buffer.push(c);
                    self.after_cr = false;
                }
            }
        }
    }
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`; the space after the colon
/// is optional. Comments (`: keepalive`) and other fields return `None`.
///
/// # Example
/// ```
/// use genstream::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// assert_eq!(parse_sse_line(": keepalive"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Parse the payload lines of one complete frame.
///
/// Lines that fail to deserialize are logged with a preview of at most
/// `preview_len` characters and skipped; they never affect sibling lines.
pub fn parse_frame(frame: &str, preview_len: usize) -> impl Iterator<Item = Frame> + '_ {
    frame
        .lines()
        .filter_map(parse_sse_line)
        .filter_map(move |data| match serde_json::from_str::<Frame>(data) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    len = data.len(),
                    preview = preview(data, preview_len),
                    "Skipping malformed stream frame"
                );
                None
            }
        })
}

/// Truncate `text` to at most `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Turn a byte stream into a stream of protocol events.
///
/// The returned stream ends right after its terminal item: a `Done` event,
/// an error (producer `error` frame, transport failure, cancellation), or the
/// natural end of the body. Once `cancel` fires no further events are
/// yielded except a single `ClientError::StreamCancelled`.
pub fn frame_events<S, B, E>(
    bytes: S,
    options: StreamOptions,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let pump = EventPump {
        bytes: Box::pin(bytes),
        session: StreamSession::new(options),
        pending: VecDeque::new(),
        cancel,
        closed: false,
    };

    stream::unfold(pump, |mut pump| async move {
        let item = pump.next_item().await?;
        Some((item, pump))
    })
}

/// Read-loop state behind [`frame_events`].
struct EventPump<S> {
    bytes: Pin<Box<S>>,
    session: StreamSession,
    pending: VecDeque<Result<StreamEvent, ClientError>>,
    cancel: CancellationToken,
    // The consumer has seen the last item.
    closed: bool,
}

impl<S, B, E> EventPump<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    async fn next_item(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        loop {
            if self.closed {
                return None;
            }

            if self.cancel.is_cancelled() {
                self.session.cancel();
                self.pending.clear();
                self.closed = true;
                return Some(Err(ClientError::StreamCancelled));
            }

            if let Some(item) = self.pending.pop_front() {
                if self.pending.is_empty() && self.session.is_terminal() {
                    self.closed = true;
                }
                return Some(item);
            }

            if self.session.is_terminal() {
                self.closed = true;
                return None;
            }

            // The only suspension point of the session.
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => continue,
                next = self.bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let events = self.session.feed(chunk.as_ref());
                    self.pending.extend(events);
                }
                Some(Err(e)) => {
                    self.session.fail();
                    self.closed = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.closed = true;
                    return self.session.finish();
                }
            }
        }
    }
}

/// Extension trait for `reqwest::Response` to enable SSE event streaming.
///
/// # Example
/// ```ignore
/// use genstream::sse::SseResponseExt;
///
/// let response = client.post(url).send().await?;
/// let mut events = Box::pin(response.sse_events(StreamOptions::default(), cancel));
/// while let Some(event) = events.next().await {
///     println!("{:?}", event?);
/// }
/// ```
pub trait SseResponseExt {
    /// Convert the response body into a stream of protocol events.
    fn sse_events(
        self,
        options: StreamOptions,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send;
}

impl SseResponseExt for reqwest::Response {
    fn sse_events(
        self,
        options: StreamOptions,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send {
        frame_events(self.bytes_stream(), options, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Completion;
    use bytes::Bytes;

    fn chunked(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    async fn collect(
        parts: Vec<Vec<u8>>,
        options: StreamOptions,
    ) -> Vec<Result<StreamEvent, String>> {
        frame_events(chunked(parts), options, CancellationToken::new())
            .map(|item| item.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    const HELLO_WORLD: &str = "data: {\"type\":\"chunk\",\"content\":\"Hello\"}\n\n\
        data: {\"type\":\"chunk\",\"content\":\" world\"}\n\n\
        data: {\"type\":\"done\",\"content\":\"Hello world\",\"tokens_used\":5,\"model\":\"m1\"}\n\n";

    fn hello_world_events() -> Vec<Result<StreamEvent, String>> {
        vec![
            Ok(StreamEvent::Chunk("Hello".to_string())),
            Ok(StreamEvent::Chunk(" world".to_string())),
            Ok(StreamEvent::Done(Completion {
                content: "Hello world".to_string(),
                tokens_used: 5,
                model: "m1".to_string(),
            })),
        ]
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: hello"), Some("hello"));
        assert_eq!(parse_sse_line("data:hello"), Some("hello"));
        assert_eq!(parse_sse_line("data:   spaces  "), Some("spaces"));
        assert_eq!(parse_sse_line(": keepalive"), None);
        assert_eq!(parse_sse_line("event: message"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn test_frame_buffer_keeps_partial_tail() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push("data: {\"a\"").is_empty());
        assert_eq!(buffer.remainder(), "data: {\"a\"");

        let frames = buffer.push(":1}\n\ndata: x\n");
        assert_eq!(frames, vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(buffer.remainder(), "data: x\n");

        let frames = buffer.push("\n");
        assert_eq!(frames, vec!["data: x".to_string()]);
        assert_eq!(buffer.remainder(), "");
    }

    #[test]
    fn test_frame_buffer_tail_never_holds_complete_frame() {
        let mut buffer = FrameBuffer::new();
        for piece in HELLO_WORLD.as_bytes().chunks(7) {
            buffer.push(std::str::from_utf8(piece).unwrap());
            assert!(!buffer.remainder().contains(FRAME_DELIMITER));
        }
        assert_eq!(buffer.remainder(), "");
    }

    #[test]
    fn test_frame_buffer_large_frame_in_small_pushes() {
        let content = "é".repeat(2000);
        let body = format!("data: {{\"type\":\"done\",\"content\":\"{}\"}}\n\ndata: x\n\n", content);

        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        let mut rest = body.as_str();
        while !rest.is_empty() {
            let mut cut = rest.len().min(3);
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            frames.extend(buffer.push(&rest[..cut]));
            rest = &rest[cut..];
        }

        assert_eq!(frames.len(), 2);
        assert!(frames[0].ends_with(&format!("{}\"}}", content)));
        assert_eq!(frames[1], "data: x");
        assert_eq!(buffer.remainder(), "");
    }

    #[test]
    fn test_frame_buffer_delimiter_after_multibyte_tail() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push("data: é").is_empty());
        assert!(buffer.push("\n").is_empty());
        assert_eq!(buffer.push("\ndata: 🦀\n"), vec!["data: é".to_string()]);
        assert_eq!(buffer.push("\n"), vec!["data: 🦀".to_string()]);
    }

    #[test]
    fn test_frame_buffer_normalizes_crlf_across_pushes() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push("data: a\r").is_empty());
        assert_eq!(buffer.remainder(), "data: a\n");
        let frames = buffer.push("\n\r\ndata: b\r\r");
        assert_eq!(frames, vec!["data: a".to_string(), "data: b".to_string()]);
        assert_eq!(buffer.take_remainder(), "");
    }

    #[test]
    fn test_frame_buffer_skips_blank_frames() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push("\n\n\n\ndata: x\n\n");
        assert_eq!(frames, vec!["data: x".to_string()]);
    }

    #[test]
    fn test_parse_frame_ignores_comments_and_bad_lines() {
        let frame = ": keepalive\nevent: message\ndata: {oops\ndata: {\"type\":\"chunk\",\"content\":\"ok\"}";
        let frames: Vec<Frame> = parse_frame(frame, 10).collect();
        assert_eq!(frames, vec![Frame::Chunk { content: "ok".to_string() }]);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("", 3), "");
    }

    #[tokio::test]
    async fn test_single_chunk_body() {
        let events = collect(vec![HELLO_WORLD.as_bytes().to_vec()], StreamOptions::default()).await;
        assert_eq!(events, hello_world_events());
    }

    #[tokio::test]
    async fn test_fragmentation_independence() {
        let bytes = HELLO_WORLD.as_bytes();
        let expected = hello_world_events();

        for split in 1..bytes.len() {
            let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            assert_eq!(collect(parts, StreamOptions::default()).await, expected, "split at {}", split);
        }

        for size in [1, 2, 3, 5, 8, 13] {
            let parts = bytes.chunks(size).map(|c| c.to_vec()).collect();
            assert_eq!(collect(parts, StreamOptions::default()).await, expected, "chunk size {}", size);
        }
    }

    #[tokio::test]
    async fn test_multibyte_content_split_across_chunks() {
        let body = "data: {\"type\":\"chunk\",\"content\":\"héllo 🦀\"}\n\n";
        let bytes = body.as_bytes();
        for split in 1..bytes.len() {
            let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            assert_eq!(
                collect(parts, StreamOptions::default()).await,
                vec![Ok(StreamEvent::Chunk("héllo 🦀".to_string()))],
                "split at {}",
                split
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_is_isolated() {
        let body = "data: {not valid json}\n\ndata: {\"type\":\"chunk\",\"content\":\"ok\"}\n\n";
        let events = collect(vec![body.as_bytes().to_vec()], StreamOptions::default()).await;
        assert_eq!(events, vec![Ok(StreamEvent::Chunk("ok".to_string()))]);
    }

    #[tokio::test]
    async fn test_error_frame_is_terminal() {
        let body = "data: {\"type\":\"error\",\"error\":\"model unavailable\"}\n\n\
            data: {\"type\":\"chunk\",\"content\":\"late\"}\n\n";
        let events = collect(vec![body.as_bytes().to_vec()], StreamOptions::default()).await;
        assert_eq!(events, vec![Err("Server stream error: model unavailable".to_string())]);
    }

    #[tokio::test]
    async fn test_done_abandons_remaining_bytes() {
        let body = "data: {\"type\":\"done\",\"content\":\"\",\"tokens_used\":0,\"model\":\"m\"}\n\n";
        let parts = vec![
            body.as_bytes().to_vec(),
            b"data: {\"type\":\"chunk\",\"content\":\"after\"}\n\n".to_vec(),
        ];
        let events = collect(parts, StreamOptions::default()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::Done(_))));
    }

    #[tokio::test]
    async fn test_stream_without_terminal_frame() {
        let body = "data: {\"type\":\"chunk\",\"content\":\"partial\"}\n\ndata: {\"type\":\"chu";
        let events = collect(vec![body.as_bytes().to_vec()], StreamOptions::default()).await;
        assert_eq!(events, vec![Ok(StreamEvent::Chunk("partial".to_string()))]);

        let strict = StreamOptions::default().with_strict_termination(true);
        let events = collect(vec![body.as_bytes().to_vec()], strict).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Err(msg) if msg.starts_with("Stream ended without a terminal frame")));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: {\"type\":\"chunk\",\"content\":\"b\"}\n\n")),
        ];
        let events: Vec<_> = frame_events(stream::iter(parts), StreamOptions::default(), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Chunk("a".to_string()));
        assert!(matches!(events[1], Err(ClientError::Io(_))));
    }

    #[tokio::test]
    async fn test_cancellation_suppresses_dispatch() {
        let cancel = CancellationToken::new();
        let body = "data: {\"type\":\"chunk\",\"content\":\"one\"}\n\ndata: {\"type\":\"chunk\",\"content\":\"two\"}\n\n";
        let mut events = Box::pin(frame_events(
            chunked(vec![body.as_bytes().to_vec()]),
            StreamOptions::default(),
            cancel.clone(),
        ));

        assert_eq!(events.next().await.unwrap().unwrap(), StreamEvent::Chunk("one".to_string()));
        cancel.cancel();
        assert!(matches!(events.next().await, Some(Err(ClientError::StreamCancelled))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_pending_read() {
        let cancel = CancellationToken::new();
        let never = stream::pending::<Result<Bytes, std::io::Error>>();
        let mut events = Box::pin(frame_events(never, StreamOptions::default(), cancel.clone()));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });

        assert!(matches!(events.next().await, Some(Err(ClientError::StreamCancelled))));
        assert!(events.next().await.is_none());
    }
}
