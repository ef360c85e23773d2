use serde::{Deserialize, Serialize};

/// Serializable unit of cached content: the upstream body verbatim plus its
/// content type. The cache never parses the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl CachedPayload {
    /// Create a payload with an explicit content type
    pub fn new(body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            body,
            content_type: content_type.into(),
        }
    }

    /// Create a JSON payload
    pub fn json(body: Vec<u8>) -> Self {
        Self::new(body, "application/json")
    }
}
