//! Streaming a generation from the command line.
//!
//! Run with:
//! ```bash
//! export GENSTREAM_BASE_URL="https://api.example.com/v1"
//! export GENSTREAM_TOKEN="your-token"
//! RUST_LOG=genstream=debug cargo run --example streaming -- projects p-1 generate
//! ```
//!
//! Ctrl-C cancels the stream.

use std::io::Write;

use futures::StreamExt;
use genstream::auth::StaticToken;
use genstream::client::{ClientError, StreamClient};
use genstream::model::{StreamEvent, StreamRequest};
use genstream::options::{StreamOptions, TransportOptions};
use nonempty::NonEmpty;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let segments: Vec<String> = std::env::args().skip(1).collect();
    let path = NonEmpty::from_vec(segments).unwrap_or_else(|| NonEmpty::new("generate".to_string()));

    let client = StreamClient::new(TransportOptions::from_env()?, StaticToken::from_env("GENSTREAM_TOKEN"))?
        .with_stream_options(StreamOptions::default().with_strict_termination(true));

    let request = StreamRequest::new(
        path,
        "prompt",
        serde_json::json!({"text": "Write a haiku about Rust programming."}),
    )
    .with_origin(serde_json::json!({"source": "cli-demo"}));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let events = match client.stream(&request, cancel).await {
        Ok(events) => events,
        Err(e) if e.is_auth_error() => {
            eprintln!("Please sign in again: {}", e);
            return Err(e.into());
        }
        Err(e) => {
            eprintln!("Error starting stream: {}", e);
            return Err(e.into());
        }
    };
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::Chunk(text)) => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            Ok(StreamEvent::Done(done)) => {
                println!("\n\n=== Stream Complete ===");
                println!("Model: {}", done.model);
                println!("Tokens used: {}", done.tokens_used);
            }
            Err(ClientError::StreamCancelled) => {
                eprintln!("\nCancelled.");
                break;
            }
            Err(e) => {
                eprintln!("\nError in stream: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
