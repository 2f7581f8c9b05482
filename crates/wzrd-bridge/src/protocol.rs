//! Sandbox → host message protocol.
//!
//! The renderer posts plain JSON objects tagged by `type`.  Exactly one tag
//! is understood:
//!
//! ```json
//! { "type": "updateDocument", "data": "<entire new document text>" }
//! ```
//!
//! There is no host → sandbox message, no acknowledgement and no version
//! field.  Anything else that arrives is reported as a [`ProtocolError`] so the
//! caller can trace it, and is otherwise ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag of the update-document request.
pub const UPDATE_DOCUMENT: &str = "updateDocument";

/// A recognized message from the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SandboxMessage {
    /// Replace the whole document with the payload.
    #[serde(rename = "updateDocument")]
    UpdateDocument(String),
}

/// Why an inbound value was not a [`SandboxMessage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The value was not an object with a string `type`.
    #[error("message has no string `type` tag")]
    Untagged,

    /// The tag is not one this host understands.
    #[error("unknown message type: {0}")]
    UnknownTag(String),

    /// The tag is known but the payload has the wrong shape.
    #[error("malformed `{tag}` message: {reason}")]
    Malformed { tag: String, reason: String },
}

impl SandboxMessage {
    /// Decode one inbound value.
    pub fn decode(raw: &Value) -> Result<Self, ProtocolError> {
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::Untagged)?;

        if tag != UPDATE_DOCUMENT {
            return Err(ProtocolError::UnknownTag(tag.to_owned()));
        }

        Self::deserialize(raw).map_err(|e| ProtocolError::Malformed {
            tag: tag.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Decode one inbound JSON text frame.
    pub fn decode_str(text: &str) -> Result<Self, ProtocolError> {
        let raw: Value = serde_json::from_str(text).map_err(|_| ProtocolError::Untagged)?;
        Self::decode(&raw)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::UpdateDocument(_) => UPDATE_DOCUMENT,
        }
    }
}
