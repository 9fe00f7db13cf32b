//! HTTP client utilities for the streaming endpoint.
//!
//! This module provides reqwest client construction, request URL building
//! and header helpers used by [`StreamClient`](crate::client::StreamClient).

use reqwest::{Client, RequestBuilder, Url};
use std::collections::HashMap;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("invalid proxy {:?}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Build `<base_url>/<segment>/...?stream=true`.
///
/// Segments are percent-encoded individually, so identifiers containing `/`
/// or spaces stay a single path segment.
///
/// # Example
/// ```
/// use genstream::http::stream_url;
///
/// let url = stream_url("https://api.example.com/v1/", ["chats", "a b", "generate"]).unwrap();
/// assert_eq!(url.as_str(), "https://api.example.com/v1/chats/a%20b/generate?stream=true");
/// ```
pub fn stream_url<I, S>(base_url: &str, segments: I) -> Result<Url, ClientError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = Url::parse(base_url)
        .map_err(|e| ClientError::Config(format!("invalid base URL {:?}: {}", base_url, e)))?;

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ClientError::Config(format!("base URL {:?} cannot have a path", base_url)))?;
        path.pop_if_empty();
        path.extend(segments);
    }

    url.query_pairs_mut().append_pair("stream", "true");
    Ok(url)
}
