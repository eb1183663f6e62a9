//! Inbound query parsing.

use axum::body::Bytes;
use serde_json::{Map, Value};

/// Why an inbound payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedQuery {
    /// The body is not JSON.
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    /// The body is JSON but not an object.
    #[error("request body must be a JSON object")]
    NotAnObject,
    /// The identifier field is absent.
    #[error("missing {0}")]
    MissingField(String),
    /// The identifier field is not a non-empty string.
    #[error("{0} must be a non-empty string")]
    InvalidField(String),
}

/// Where the target identifier of a query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// Read from the JSON payload.
    Payload,
    /// Supplied by the caller because the payload had none.
    Fallback,
}

/// An inbound query: the identifier plus the untouched original bytes.
#[derive(Debug, Clone)]
pub struct InboundQuery {
    /// Target identifier.
    pub target: String,
    /// Where `target` came from.
    pub source: TargetSource,
    /// The payload exactly as received.
    pub body: Bytes,
}

impl InboundQuery {
    /// Parse a JSON object payload and read `field` as the target identifier.
    pub fn parse(body: Bytes, field: &str) -> Result<Self, MalformedQuery> {
        Self::parse_with_fallback(body, field, None)
    }

    /// Like [`InboundQuery::parse`], but use `fallback` when the payload has
    /// no `field` at all. A present but unusable field is still rejected.
    pub fn parse_with_fallback(
        body: Bytes,
        field: &str,
        fallback: Option<&str>,
    ) -> Result<Self, MalformedQuery> {
        let object = parse_object(&body)?;
        let (target, source) = match (target_from_object(&object, field), fallback) {
            (Err(MalformedQuery::MissingField(_)), Some(fallback)) => {
                (fallback.to_string(), TargetSource::Fallback)
            }
            (result, _) => (result?, TargetSource::Payload),
        };

        Ok(Self {
            target,
            source,
            body,
        })
    }

    /// Build a payload for a query that arrived without a body.
    pub fn synthesize(target: impl Into<String>, field: &str) -> Self {
        let target = target.into();
        let mut object = Map::new();
        object.insert(field.to_string(), Value::String(target.clone()));
        let body = Bytes::from(Value::Object(object).to_string());
        Self {
            target,
            source: TargetSource::Fallback,
            body,
        }
    }
}

/// Whether a body carries anything besides whitespace.
pub fn has_content(body: &[u8]) -> bool {
    body.iter().any(|b| !b.is_ascii_whitespace())
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, MalformedQuery> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(MalformedQuery::NotAnObject),
        Err(e) => Err(MalformedQuery::InvalidJson(e.to_string())),
    }
}

fn target_from_object(object: &Map<String, Value>, field: &str) -> Result<String, MalformedQuery> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MalformedQuery::MissingField(field.to_string())),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(_) => Err(MalformedQuery::InvalidField(field.to_string())),
    }
}
