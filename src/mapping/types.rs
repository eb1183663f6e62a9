//! Routing rule types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single routing rule: target identifier to downstream base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Lookup key (e.g., an equipment number).
    pub target: String,
    /// Base URL of the downstream service. A non-string value reads as `None`.
    #[serde(
        rename = "redirectUrl",
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_url: Option<String>,
    /// Older documents spell the field `redirdectUrl`. Used only when
    /// `redirectUrl` is unusable.
    #[serde(
        rename = "redirdectUrl",
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_redirect_url: Option<String>,
    /// Fields the router does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MappingRecord {
    /// Create a record with a redirect URL and no extra fields.
    pub fn new(target: impl Into<String>, redirect_url: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            redirect_url: Some(redirect_url.into()),
            legacy_redirect_url: None,
            extra: Map::new(),
        }
    }

    /// Create a record that carries no redirect URL.
    pub fn without_url(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            redirect_url: None,
            legacy_redirect_url: None,
            extra: Map::new(),
        }
    }

    /// The redirect URL if it is present and not blank, `redirectUrl` first.
    pub fn usable_redirect_url(&self) -> Option<&str> {
        [&self.redirect_url, &self.legacy_redirect_url]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .find(|url| !url.trim().is_empty())
    }
}

/// Read a string field; any other JSON value reads as `None`.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(url) => Some(url),
        _ => None,
    })
}
