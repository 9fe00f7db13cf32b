//! Options structures for transport and stream-session configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "GENSTREAM_BASE_URL";

/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "GENSTREAM_TIMEOUT_SECS";

/// A secret string type for sensitive data like bearer tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// HTTP transport configuration.
///
/// # Example
/// ```rust
/// use genstream::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::new("https://api.example.com")
///     .with_timeout(Duration::from_secs(300))
///     .with_header("X-Client".to_string(), "docs".to_string());
/// assert_eq!(options.base_url, "https://api.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Base URL that request paths are appended to
    pub base_url: String,

    /// Whole-request timeout; covers the streamed body as well
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl TransportOptions {
    /// Create transport options for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Read transport options from `GENSTREAM_BASE_URL` and `GENSTREAM_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var(BASE_URL_ENV)
            .map_err(|_| ClientError::Config(format!("{} is not set", BASE_URL_ENV)))?;

        let mut options = Self::new(base_url);
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ClientError::Config(format!("invalid {} value {:?}: {}", TIMEOUT_ENV, raw, e))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }
        Ok(options)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Per-session behaviour of the frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum number of characters of a malformed payload echoed into the log
    pub preview_len: usize,

    /// Yield `ClientError::IncompleteStream` when the body ends without `done`/`error`
    pub strict_termination: bool,

    /// Compare `done.content` against the concatenated chunks
    pub verify_content: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            preview_len: 100,
            strict_termination: false,
            verify_content: false,
        }
    }
}

impl StreamOptions {
    /// Set the log preview length.
    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }

    /// Treat a stream without a terminal frame as an error.
    pub fn with_strict_termination(mut self, strict: bool) -> Self {
        self.strict_termination = strict;
        self
    }

    /// Verify the final content against the received chunks.
    pub fn with_content_verification(mut self, verify: bool) -> Self {
        self.verify_content = verify;
        self
    }
}
