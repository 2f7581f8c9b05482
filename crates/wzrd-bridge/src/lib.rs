//! Wzrd graph editor bridge.
//!
//! This crate connects a text document owned by a host editor to the Wzrd
//! graph renderer running inside a sandboxed web surface.  The two sides only
//! talk through asynchronous messages:
//!
//! - **[`document`]** -- [`Document`] snapshots and the [`DocumentAdapter`]
//!   that reads and fully replaces text through the host's [`TextBuffer`].
//! - **[`bootstrap`]** -- builds the one-time initialization markup: session
//!   [`Nonce`], [`ContentSecurityPolicy`], resolved renderer assets and the
//!   embedded initial text.
//! - **[`protocol`]** -- the [`SandboxMessage`] wire contract from sandbox to
//!   host.
//! - **[`sandbox`]** -- host-side seams for the surface and its message
//!   channel.
//! - **[`controller`]** -- [`BridgeController`] owns the session map, wires
//!   new surfaces and dispatches inbound messages.
//! - **[`config`]** -- [`BridgeConfig`] loaded from TOML.
//! - **[`error`]** -- [`BridgeError`] enumerates every failure mode.
//!
//! Content flows host → sandbox exactly once, at bootstrap.  After that the
//! renderer pushes whole-document replacements back; the host never pushes
//! later edits into a live surface.

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod protocol;
pub mod sandbox;

pub use bootstrap::{
    Bootstrap, Bootstrapper, ContentSecurityPolicy, EntropySource, MarkupBuilder, Nonce,
};
pub use config::{AssetConfig, BridgeConfig, EvalException, MarkupConfig, PolicyConfig};
pub use controller::{BridgeController, Dispatch, IgnoreReason, SessionId, SessionInfo};
pub use document::{
    Document, DocumentAdapter, DocumentUri, EditRange, MemoryBuffer, PendingEdit, Position,
    ReplaceEdit, TextBuffer, TextRange,
};
pub use error::{BridgeError, Result};
pub use protocol::{ProtocolError, SandboxMessage};
pub use sandbox::{Inbox, MappedSurface, Outbox, SandboxOptions, SandboxSurface, channel};
