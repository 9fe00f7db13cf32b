//! Per-request stream session: decoding, reassembly and event dispatch.
//!
//! A session moves through
//! `Idle -> Reading -> {Done | Failed | Closed | Cancelled}`.
//! Terminal states are entered once and never left; after that `feed`
//! produces nothing.

use crate::client::ClientError;
use crate::decode::Utf8Decoder;
use crate::model::{Completion, Frame, StreamEvent};
use crate::options::StreamOptions;
use crate::sse::{parse_frame, preview, FrameBuffer};

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing received yet
    Idle,
    /// Bytes are flowing; chunk events may be produced
    Reading,
    /// A `done` frame was dispatched
    Done,
    /// An `error` frame, a transport failure or a content mismatch ended the session
    Failed,
    /// The body ended without a terminal frame
    Closed,
    /// The caller cancelled the session
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Reading)
    }
}

/// State owned by one streaming call.
///
/// The session is fed raw transport chunks and returns the events completed
/// by each one. Processing is synchronous; the caller owns the read loop.
#[derive(Debug)]
pub struct StreamSession {
    decoder: Utf8Decoder,
    frames: FrameBuffer,
    state: SessionState,
    options: StreamOptions,
    received: String,
}

impl StreamSession {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            frames: FrameBuffer::new(),
            state: SessionState::Idle,
            options,
            received: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Process one raw chunk and return the events it completed, in order.
    ///
    /// Stops at the first terminal frame; anything after it in the same
    /// chunk is dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, ClientError>> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }
        if self.state == SessionState::Idle {
            self.transition(SessionState::Reading);
        }

        tracing::trace!(bytes = chunk.len(), "Received stream chunk");
        let text = self.decoder.decode(chunk);
        let preview_len = self.options.preview_len;

        for frame in self.frames.push(&text) {
            for payload in parse_frame(&frame, preview_len) {
                if let Some(event) = self.dispatch(payload) {
                    events.push(event);
                }
                if self.is_terminal() {
                    return events;
                }
            }
        }
        events
    }

    /// Handle the end of the body.
    ///
    /// Any unterminated tail is logged and discarded. Returns
    /// `ClientError::IncompleteStream` only under strict termination.
    pub fn finish(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        if self.is_terminal() {
            return None;
        }

        let mut tail = self.frames.take_remainder();
        if let Some(rest) = self.decoder.finish() {
            tail.push_str(&rest);
        }
        if !tail.trim().is_empty() {
            tracing::warn!(
                len = tail.len(),
                preview = preview(&tail, self.options.preview_len),
                "Stream ended with an incomplete frame, discarding it"
            );
        }

        self.transition(SessionState::Closed);
        if self.options.strict_termination {
            Some(Err(ClientError::IncompleteStream {
                buffered: tail.len(),
            }))
        } else {
            tracing::debug!("Stream closed without a terminal frame");
            None
        }
    }

    /// Mark the session failed after a transport error.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.transition(SessionState::Failed);
        }
    }

    /// Mark the session cancelled by the caller.
    pub fn cancel(&mut self) {
        if !self.is_terminal() {
            self.transition(SessionState::Cancelled);
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Option<Result<StreamEvent, ClientError>> {
        match frame {
            Frame::Chunk { content } if content.is_empty() => None,
            Frame::Chunk { content } => {
                if self.options.verify_content {
                    self.received.push_str(&content);
                }
                Some(Ok(StreamEvent::Chunk(content)))
            }
            Frame::Done {
                content,
                tokens_used,
                model,
            } => {
                if self.options.verify_content && content != self.received {
                    self.transition(SessionState::Failed);
                    return Some(Err(ClientError::ContentMismatch {
                        reported: content.len(),
                        received: self.received.len(),
                    }));
                }
                self.transition(SessionState::Done);
                Some(Ok(StreamEvent::Done(Completion {
                    content,
                    tokens_used,
                    model,
                })))
            }
            Frame::Error { error } => {
                self.transition(SessionState::Failed);
                let message = error.unwrap_or_else(|| "unknown error".to_string());
                Some(Err(ClientError::Server(message)))
            }
            Frame::Unknown => {
                tracing::debug!("Ignoring stream frame of unknown type");
                None
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "Stream session transition");
        self.state = next;
    }
}
