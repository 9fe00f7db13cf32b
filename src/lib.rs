//! # genstream - streaming text-generation client
//!
//! A small client for HTTP endpoints that stream generated text as
//! Server-Sent-Events-style frames over a chunked response body.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Reassembly of frames split across arbitrary network chunks, including
//!   multi-byte characters
//! - Malformed frames are logged and skipped without ending the stream
//! - At most one terminal event (`done` or `error`) per stream
//! - Cancellation through `tokio_util::sync::CancellationToken`
//! - Credentials injected through the [`CredentialProvider`] trait
//!
//! ## Architecture
//!
//! Bytes flow through the pipeline
//! `StreamClient -> Utf8Decoder -> FrameBuffer -> parse_frame -> StreamSession`
//! and come out either as a `Stream` of [`StreamEvent`]s or as calls on a
//! [`StreamHandler`].
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use genstream::auth::StaticToken;
//! use genstream::client::StreamClient;
//! use genstream::model::{StreamEvent, StreamRequest};
//! use genstream::options::TransportOptions;
//! use nonempty::NonEmpty;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::new(
//!         TransportOptions::new("https://api.example.com"),
//!         StaticToken::from_env("GENSTREAM_TOKEN"),
//!     )?;
//!
//!     let request = StreamRequest::new(
//!         NonEmpty::new("generate".to_string()),
//!         "prompt",
//!         serde_json::json!({"text": "Hello!"}),
//!     );
//!
//!     let events = client.stream(&request, CancellationToken::new()).await?;
//!     futures::pin_mut!(events);
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             StreamEvent::Chunk(text) => print!("{}", text),
//!             StreamEvent::Done(done) => println!("\n[{} tokens, {}]", done.tokens_used, done.model),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod decode;
pub mod handler;
pub mod http;
pub mod model;
pub mod options;
pub mod session;
pub mod sse;

// Re-exports for convenience
pub use auth::{CredentialProvider, StaticToken};
pub use client::{ClientError, StreamClient};
pub use handler::{callbacks, Callbacks, StreamHandler};
pub use model::{Completion, Frame, StreamEvent, StreamRequest};
pub use options::{SecretString, StreamOptions, TransportOptions};
pub use session::{SessionState, StreamSession};
