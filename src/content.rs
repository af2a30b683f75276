//! Response-body unmarshalling by content type.
//!
//! Two content families are decoded: JSON and MessagePack. Any other content
//! type produces no payload (`null`), not an error.

use serde_json::Value;

use crate::error::{Error, Result};

pub const APP_JSON: &str = "application/json";
pub const APP_MSGPACK: &str = "application/msgpack";
pub const APP_X_MSGPACK: &str = "application/x-msgpack";

/// Content family of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFamily {
    Json,
    MessagePack,
    Unsupported,
}

impl ContentFamily {
    /// Classify a `Content-Type` header value (parameters such as `charset` are ignored)
    pub fn from_content_type(content_type: &str) -> Self {
        let media = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if media == APP_JSON || (media.starts_with("application/") && media.ends_with("+json")) {
            ContentFamily::Json
        } else if media == APP_MSGPACK || media == APP_X_MSGPACK {
            ContentFamily::MessagePack
        } else {
            ContentFamily::Unsupported
        }
    }
}

/// Decode a raw body according to its content type.
///
/// An empty body decodes to `null` in every family.
pub fn unmarshal(content_type: Option<&str>, body: &[u8]) -> Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }

    match ContentFamily::from_content_type(content_type.unwrap_or("")) {
        ContentFamily::Json => serde_json::from_slice(body)
            .map_err(|e| Error::decode(format!("invalid JSON response body: {}", e))),
        ContentFamily::MessagePack => rmp_serde::from_slice(body)
            .map_err(|e| Error::decode(format!("invalid MessagePack response body: {}", e))),
        ContentFamily::Unsupported => Ok(Value::Null),
    }
}
