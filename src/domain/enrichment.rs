use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged opaque JSON blob associated with an update operation.
///
/// The engine never interprets the payload; it is handed verbatim to
/// whichever matcher/enricher consumer declared interest in this `tag`
/// (e.g. `"cvss"`, `"kev"`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub tag: String,
    pub payload: Value,
}

impl EnrichmentRecord {
    pub fn new(tag: impl Into<String>, payload: Value) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }
}
