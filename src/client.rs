//! Streaming client and error types.

use std::sync::Arc;

use futures::Stream;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialProvider;
use crate::handler::{dispatch, StreamHandler};
use crate::http::{add_extra_headers, build_http_client, stream_url};
use crate::model::{ErrorBody, StreamEvent, StreamRequest};
use crate::options::{StreamOptions, TransportOptions};
use crate::sse::SseResponseExt;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No credentials available")]
    AuthMissing,

    #[error("Authentication required (HTTP {status})")]
    AuthRequired { status: u16 },

    #[error("Request failed: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Server stream error: {0}")]
    Server(String),

    #[error("Stream ended without a terminal frame ({buffered} bytes discarded)")]
    IncompleteStream { buffered: usize },

    #[error("Final content does not match received chunks (reported {reported} bytes, received {received} bytes)")]
    ContentMismatch { reported: usize, received: usize },

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the caller has to (re-)authenticate before retrying.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::AuthMissing | ClientError::AuthRequired { .. })
    }
}

/// Client for a streaming text-generation endpoint.
///
/// Each call opens its own request and owns its own session; one client can
/// drive any number of concurrent streams.
///
/// # Example
/// ```no_run
/// use genstream::auth::StaticToken;
/// use genstream::client::StreamClient;
/// use genstream::handler::callbacks;
/// use genstream::model::StreamRequest;
/// use genstream::options::TransportOptions;
/// use nonempty::NonEmpty;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = StreamClient::new(
///         TransportOptions::new("https://api.example.com"),
///         StaticToken::new("your-token"),
///     )?;
///
///     let request = StreamRequest::new(
///         NonEmpty::new("generate".to_string()),
///         "prompt",
///         serde_json::json!({"text": "Hello!"}),
///     );
///
///     let mut handler = callbacks(
///         |chunk: &str| print!("{}", chunk),
///         |done| println!("\n{} tokens", done.tokens_used),
///     );
///     client
///         .execute_stream(&request, &mut handler, CancellationToken::new())
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    transport_options: TransportOptions,
    stream_options: StreamOptions,
    credentials: Arc<dyn CredentialProvider>,
}

impl StreamClient {
    /// Create a client with default stream options.
    pub fn new(
        transport_options: TransportOptions,
        credentials: impl CredentialProvider + 'static,
    ) -> Result<Self, ClientError> {
        Self::with_credentials(transport_options, Arc::new(credentials))
    }

    /// Create a client sharing an existing credential provider.
    pub fn with_credentials(
        transport_options: TransportOptions,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&transport_options)?,
            transport_options,
            stream_options: StreamOptions::default(),
            credentials,
        })
    }

    /// Replace the per-session stream options.
    pub fn with_stream_options(mut self, stream_options: StreamOptions) -> Self {
        self.stream_options = stream_options;
        self
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    pub fn stream_options(&self) -> &StreamOptions {
        &self.stream_options
    }

    /// Send the request and return the response once it is known to be a
    /// successful streaming response. The body is left unread.
    pub async fn open(
        &self,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        let token = self
            .credentials
            .token()
            .await
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or(ClientError::AuthMissing)?;

        let url = stream_url(&self.transport_options.base_url, request.path.iter())?;
        tracing::debug!(%url, "Opening generation stream");

        let mut req = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");

        req = add_extra_headers(req, &self.transport_options.extra_headers);
        req = req.json(&request.body());

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::StreamCancelled),
            response = req.send() => response?,
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(status = status.as_u16(), "Stream request rejected, authentication required");
            self.credentials.on_auth_required(status.as_u16());
            return Err(ClientError::AuthRequired {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::StreamCancelled),
                body = response.text() => body.unwrap_or_default(),
            };
            let error = Self::handle_error_response(status, &body);
            tracing::warn!(status = status.as_u16(), error = %error, "Stream request failed");
            return Err(error);
        }

        Ok(response)
    }

    /// Open a stream of generation events.
    ///
    /// Failures before the body is read (missing credentials, 401/403, other
    /// non-2xx statuses, connection errors) are returned directly. Failures
    /// after that arrive as `Err` items, and the stream ends after the first
    /// terminal item.
    pub async fn stream(
        &self,
        request: &StreamRequest,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ClientError>> + Send, ClientError> {
        let response = self.open(request, &cancel).await?;
        Ok(response.sse_events(self.stream_options, cancel))
    }

    /// Run a streaming request to completion, reporting to `handler`.
    ///
    /// Resolves when the session ends: after `on_done`, after a handled
    /// error, or when the body ends without a terminal frame.
    pub async fn execute_stream<H>(
        &self,
        request: &StreamRequest,
        handler: &mut H,
        cancel: CancellationToken,
    ) -> Result<(), ClientError>
    where
        H: StreamHandler + ?Sized,
    {
        let events = self.stream(request, cancel).await?;
        dispatch(events, handler).await
    }

    /// Map a non-2xx response to an error, preferring the server's message.
    fn handle_error_response(status: StatusCode, body: &str) -> ClientError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    format!("HTTP {}: {}", status, body.trim())
                }
            });

        ClientError::RequestFailed {
            status: status.as_u16(),
            message,
        }
    }
}
