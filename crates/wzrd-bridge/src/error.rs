//! Bridge error types.
//!
//! Every public API in this crate returns [`BridgeError`].  Message decoding
//! has its own [`ProtocolError`](crate::protocol::ProtocolError) because a
//! bad message is never surfaced to the caller, only traced and ignored.

use std::path::PathBuf;

/// Unified error type for the host/sandbox bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // -- Session lifecycle --------------------------------------------------
    /// The sandbox could not be initialized (e.g. no nonce could be drawn).
    #[error("sandbox initialization failed: {reason}")]
    SandboxInit { reason: String },

    /// The referenced session is not open.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    // -- Documents ----------------------------------------------------------
    /// A document identifier could not be parsed.
    #[error("invalid document uri `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The host buffer has no document for this identifier.
    #[error("document not found: {uri}")]
    DocumentNotFound { uri: String },

    /// The host buffer failed to read or write a document.
    #[error("document buffer error for {uri}: {reason}")]
    Buffer { uri: String, reason: String },

    // -- Sandbox resources --------------------------------------------------
    /// A local resource could not be mapped to an address inside the sandbox.
    #[error("cannot resolve resource `{}`: {reason}", path.display())]
    ResourceResolution { path: PathBuf, reason: String },

    // -- Configuration ------------------------------------------------------
    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    // -- Generic ------------------------------------------------------------
    /// JSON encoding failed while building the markup.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred (e.g. reading a configuration file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the bridge crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
