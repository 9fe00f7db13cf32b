//! Request, wire-frame and event types.

use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// A streaming generation request.
///
/// The body is sent as `{ "<payload_field>": <payload>, "origin"?: <origin> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Path segments of the target resource, appended to the base URL
    pub path: NonEmpty<String>,

    /// Name of the body field carrying the payload
    pub payload_field: String,

    /// JSON payload
    pub payload: Value,

    /// Optional metadata describing where the request was issued from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Value>,
}

impl StreamRequest {
    /// Create a request for the resource at `path`.
    pub fn new(path: NonEmpty<String>, payload_field: impl Into<String>, payload: Value) -> Self {
        Self {
            path,
            payload_field: payload_field.into(),
            payload,
            origin: None,
        }
    }

    /// Attach origin metadata.
    pub fn with_origin(mut self, origin: Value) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Build the JSON request body.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.payload_field.clone(), self.payload.clone());
        if let Some(origin) = &self.origin {
            body.insert("origin".to_string(), origin.clone());
        }
        Value::Object(body)
    }
}

/// One `data:` payload of the response stream, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Chunk {
        #[serde(default)]
        content: String,
    },
    Done {
        #[serde(default)]
        content: String,
        #[serde(default, deserialize_with = "deserialize_token_count")]
        tokens_used: u64,
        #[serde(default)]
        model: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Any `type` this client does not know about
    #[serde(other)]
    Unknown,
}

/// Accept any JSON number (or `null`) as a token count.
///
/// Floats are truncated, negative values and `null` become 0.
fn deserialize_token_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<Number>::deserialize(deserializer)?;
    Ok(number.map_or(0, |n| {
        n.as_u64().unwrap_or_else(|| match n.as_f64() {
            Some(f) if f.is_finite() && f > 0.0 => f as u64,
            _ => 0,
        })
    }))
}

/// Metadata delivered with the `done` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Full generated text as reported by the producer
    pub content: String,

    /// Tokens consumed by the generation
    pub tokens_used: u64,

    /// Model that produced the text
    pub model: String,
}

/// Item of a response stream.
///
/// Producer `error` frames are not represented here; they surface as
/// `Err(ClientError::Server)` so that `?` works on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Partial content fragment
    Chunk(String),

    /// Terminal success
    Done(Completion),
}

impl StreamEvent {
    /// Returns the text fragment of a `Chunk`.
    pub fn as_chunk(&self) -> Option<&str> {
        match self {
            StreamEvent::Chunk(content) => Some(content),
            StreamEvent::Done(_) => None,
        }
    }
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    /// The most specific human-readable message, if any.
    pub fn into_message(self) -> Option<String> {
        self.detail
            .filter(|s| !s.is_empty())
            .or(self.message.filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_with_origin() {
        let request = StreamRequest::new(
            NonEmpty {
                head: "projects".to_string(),
                tail: vec!["p1".to_string()],
            },
            "prompt",
            json!({"text": "hi"}),
        )
        .with_origin(json!({"view": "editor"}));

        assert_eq!(
            request.body(),
            json!({"prompt": {"text": "hi"}, "origin": {"view": "editor"}})
        );
    }

    #[test]
    fn test_request_body_without_origin() {
        let request = StreamRequest::new(NonEmpty::new("generate".to_string()), "input", json!(1));
        assert_eq!(request.body(), json!({"input": 1}));
    }

    #[test]
    fn test_frame_deserialize_variants() {
        let chunk: Frame = serde_json::from_str(r#"{"type":"chunk","content":"Hello"}"#).unwrap();
        assert_eq!(chunk, Frame::Chunk { content: "Hello".to_string() });

        let done: Frame = serde_json::from_str(
            r#"{"type":"done","content":"Hello world","tokens_used":5,"model":"m1"}"#,
        )
        .unwrap();
        assert_eq!(
            done,
            Frame::Done {
                content: "Hello world".to_string(),
                tokens_used: 5,
                model: "m1".to_string(),
            }
        );

        let error: Frame = serde_json::from_str(r#"{"type":"error","error":"boom"}"#).unwrap();
        assert_eq!(error, Frame::Error { error: Some("boom".to_string()) });
    }

    #[test]
    fn test_frame_unknown_type_is_not_an_error() {
        let frame: Frame = serde_json::from_str(r#"{"type":"heartbeat","seq":3}"#).unwrap();
        assert_eq!(frame, Frame::Unknown);
    }

    #[test]
    fn test_done_token_count_accepts_any_number() {
        let cases = [("5", 5), ("5.0", 5), ("1e3", 1000), ("-1", 0), ("null", 0)];
        for (raw, expected) in cases {
            let json = format!(
                r#"{{"type":"done","content":"x","tokens_used":{},"model":"m"}}"#,
                raw
            );
            match serde_json::from_str::<Frame>(&json) {
                Ok(Frame::Done { tokens_used, .. }) => assert_eq!(tokens_used, expected, "{}", raw),
                other => panic!("tokens_used {} gave {:?}", raw, other),
            }
        }

        let missing: Frame = serde_json::from_str(r#"{"type":"done","content":"x"}"#).unwrap();
        assert!(matches!(missing, Frame::Done { tokens_used: 0, .. }));
    }

    #[test]
    fn test_frame_missing_type_is_rejected() {
        assert!(serde_json::from_str::<Frame>(r#"{"content":"x"}"#).is_err());
    }

    #[test]
    fn test_error_body_prefers_detail() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"quota exceeded","message":"bad"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("quota exceeded"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"bad"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("bad"));

        assert_eq!(ErrorBody::default().into_message(), None);
    }
}
