//! Bridge controller.
//!
//! [`BridgeController`] owns one [`DashMap`] entry per open document/editor
//! pairing.  Opening a document bootstraps its surface and starts a message
//! pump; closing it drops the entry, which stops the pump and with it the
//! channel registration.
//!
//! # Dispatch model
//!
//! Each session's pump takes inbound messages strictly in arrival order and
//! finishes dispatching one before taking the next.  Dispatching an update
//! only *submits* the full-replace edit to the host: the pump does not wait
//! for the edit to land, so completions of successive edits may interleave.
//! Each edit targets the whole document as it stands when applied, so the
//! result is always exactly one payload.  Nothing is ever sent back to the
//! sandbox, so a failed edit is invisible to the renderer.
//!
//! [`BridgeController::handle_message`] and the pump share one dispatcher
//! per session; a message taken from either path is handled to completion
//! before the next one from any path.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bootstrap::{Bootstrapper, EntropySource, Nonce};
use crate::config::BridgeConfig;
use crate::document::{DocumentAdapter, DocumentUri, PendingEdit, TextBuffer};
use crate::error::{BridgeError, Result};
use crate::protocol::{ProtocolError, SandboxMessage};
use crate::sandbox::{Inbox, SandboxSurface};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Identifier of one open document/editor pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot of a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub uri: DocumentUri,
    pub nonce: Nonce,
    pub opened_at: DateTime<Utc>,
}

/// What happened to one inbound message.
#[derive(Debug)]
pub enum Dispatch {
    /// A full replace was submitted to the host.
    Applied(PendingEdit),
    /// The message caused no mutation.
    Ignored(IgnoreReason),
}

/// Why a message caused no mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not a recognized message.
    Protocol(ProtocolError),
    /// The document could not be read to build the edit.
    DocumentUnavailable(String),
}

impl Dispatch {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

struct SessionEntry {
    info: SessionInfo,
    dispatcher: Arc<Dispatcher>,
    pump: JoinHandle<()>,
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        // Stopping the pump drops the inbox: the channel is deregistered.
        self.pump.abort();
    }
}

/// Owns every live session and the host buffer they edit.
pub struct BridgeController {
    bootstrapper: Bootstrapper,
    buffer: Arc<dyn TextBuffer>,
    sessions: DashMap<SessionId, SessionEntry>,
}

impl fmt::Debug for BridgeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeController")
            .field("bootstrapper", &self.bootstrapper)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl BridgeController {
    /// `extension_root` is where the configured renderer assets live.
    pub fn new(
        config: BridgeConfig,
        extension_root: impl Into<PathBuf>,
        buffer: Arc<dyn TextBuffer>,
    ) -> Self {
        Self {
            bootstrapper: Bootstrapper::new(config, extension_root),
            buffer,
            sessions: DashMap::new(),
        }
    }

    /// Draw session nonces from `entropy` instead of the system CSPRNG.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.bootstrapper = self.bootstrapper.with_entropy(entropy);
        self
    }

    pub fn bootstrapper(&self) -> &Bootstrapper {
        &self.bootstrapper
    }

    /// Open a document in a fresh surface.
    ///
    /// Configures `surface`, installs the bootstrap page embedding the
    /// document's current text, and starts draining `inbox`.  Must be called
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails without creating a session if the document cannot be read, no
    /// nonce can be drawn, or the renderer assets cannot be resolved.
    pub fn open_document(
        &self,
        uri: DocumentUri,
        surface: &dyn SandboxSurface,
        inbox: Inbox,
    ) -> Result<SessionId> {
        surface.configure(self.bootstrapper.sandbox_options());

        let document = DocumentAdapter::new(uri.clone(), Arc::clone(&self.buffer));
        let snapshot = document.read()?;
        let bootstrap = self.bootstrapper.bootstrap(surface, snapshot.text())?;
        surface.set_markup(bootstrap.markup);

        let id = SessionId::new();
        let dispatcher = Arc::new(Dispatcher::new(id, document));
        let pump = tokio::spawn(pump(Arc::clone(&dispatcher), inbox));

        tracing::info!(
            session_id = %id,
            uri = %uri,
            lines = snapshot.line_count(),
            "document session opened"
        );

        self.sessions.insert(
            id,
            SessionEntry {
                info: SessionInfo {
                    id,
                    uri,
                    nonce: bootstrap.nonce,
                    opened_at: Utc::now(),
                },
                dispatcher,
                pump,
            },
        );
        Ok(id)
    }

    /// Close a session and deregister its channel.  The surface itself is
    /// the host's to destroy; nothing is sent into it.
    pub fn close_document(&self, id: SessionId) -> Result<()> {
        let (_, entry) = self
            .sessions
            .remove(&id)
            .ok_or_else(|| BridgeError::SessionNotFound {
                session_id: id.to_string(),
            })?;
        tracing::info!(session_id = %id, uri = %entry.info.uri, "document session closed");
        Ok(())
    }

    /// Dispatch one message for a live session and report the outcome.
    ///
    /// Serialized with the session's pump: messages from both paths are
    /// handled one at a time, in the order they reach the dispatcher.
    pub fn handle_message(&self, id: SessionId, raw: &Value) -> Result<Dispatch> {
        let dispatcher = self
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(&entry.dispatcher))
            .ok_or_else(|| BridgeError::SessionNotFound {
                session_id: id.to_string(),
            })?;
        Ok(dispatcher.dispatch(raw))
    }

    pub fn session(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.info.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sessions currently open on `uri`.
    pub fn sessions_for(&self, uri: &DocumentUri) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| &entry.info.uri == uri)
            .map(|entry| *entry.key())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// The single place a session's messages are handled.
struct Dispatcher {
    id: SessionId,
    document: DocumentAdapter,
    gate: Mutex<()>,
}

impl Dispatcher {
    fn new(id: SessionId, document: DocumentAdapter) -> Self {
        Self {
            id,
            document,
            gate: Mutex::new(()),
        }
    }

    fn dispatch(&self, raw: &Value) -> Dispatch {
        let _turn = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.id;

        match SandboxMessage::decode(raw) {
            Ok(SandboxMessage::UpdateDocument(text)) => {
                tracing::debug!(session_id = %id, len = text.len(), "update requested");
                match self.document.replace_all(text) {
                    Ok(pending) => Dispatch::Applied(pending),
                    Err(e) => {
                        tracing::warn!(session_id = %id, error = %e, "cannot build full replace");
                        Dispatch::Ignored(IgnoreReason::DocumentUnavailable(e.to_string()))
                    }
                }
            }
            Err(e) => {
                tracing::debug!(session_id = %id, reason = %e, "sandbox message ignored");
                Dispatch::Ignored(IgnoreReason::Protocol(e))
            }
        }
    }
}

async fn pump(dispatcher: Arc<Dispatcher>, mut inbox: Inbox) {
    while let Some(raw) = inbox.recv().await {
        // The edit's outcome is not observed.
        drop(dispatcher.dispatch(&raw));
    }
    tracing::debug!(session_id = %dispatcher.id, "sandbox channel closed");
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::document::MemoryBuffer;
    use crate::sandbox::{MappedSurface, channel};

    fn uri() -> DocumentUri {
        DocumentUri::parse("file:///graphs/a.wzrd").unwrap()
    }

    fn setup(text: &str) -> (BridgeController, Arc<MemoryBuffer>, MappedSurface) {
        let buffer = Arc::new(MemoryBuffer::new());
        buffer.open(uri(), text);
        let controller = BridgeController::new(BridgeConfig::default(), "/ext", buffer.clone());
        let surface = MappedSurface::new("/ext", Url::parse("https://assets.example/").unwrap());
        (controller, buffer, surface)
    }

    #[tokio::test]
    async fn handle_message_applies_update() {
        let (controller, buffer, surface) = setup("old");
        let (_outbox, inbox) = channel();
        let id = controller.open_document(uri(), &surface, inbox).unwrap();

        let outcome = controller
            .handle_message(id, &json!({"type": "updateDocument", "data": "new"}))
            .unwrap();
        let Dispatch::Applied(pending) = outcome else {
            panic!("expected an applied update");
        };
        assert!(pending.settled().await);
        assert_eq!(buffer.get(&uri()).as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn handle_message_ignores_unknown_tag() {
        let (controller, buffer, surface) = setup("keep");
        let (_outbox, inbox) = channel();
        let id = controller.open_document(uri(), &surface, inbox).unwrap();

        let outcome = controller
            .handle_message(id, &json!({"type": "selectNode", "data": "n1"}))
            .unwrap();
        assert!(matches!(
            outcome,
            Dispatch::Ignored(IgnoreReason::Protocol(ProtocolError::UnknownTag(_)))
        ));
        assert_eq!(buffer.get(&uri()).as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn update_for_vanished_document_is_ignored() {
        let (controller, buffer, surface) = setup("x");
        let (_outbox, inbox) = channel();
        let id = controller.open_document(uri(), &surface, inbox).unwrap();
        buffer.close(&uri());

        let outcome = controller
            .handle_message(id, &json!({"type": "updateDocument", "data": "y"}))
            .unwrap();
        assert!(matches!(
            outcome,
            Dispatch::Ignored(IgnoreReason::DocumentUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn pump_and_direct_dispatch_share_one_session() {
        let (controller, buffer, surface) = setup("start");
        let (outbox, inbox) = channel();
        let id = controller.open_document(uri(), &surface, inbox).unwrap();

        outbox.post(json!({"type": "updateDocument", "data": "from pump\nline 2"}));
        let outcome = controller
            .handle_message(id, &json!({"type": "updateDocument", "data": "direct"}))
            .unwrap();
        let Dispatch::Applied(pending) = outcome else {
            panic!("expected an applied update");
        };
        assert!(pending.settled().await);

        // Let the pump drain its copy as well.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let text = buffer.get(&uri()).unwrap();
        assert!(text == "direct" || text == "from pump\nline 2", "mixed content: {text:?}");
    }

    #[tokio::test]
    async fn nonce_failure_creates_no_session() {
        struct Exhausted;

        impl EntropySource for Exhausted {
            fn fill(&self, _dest: &mut [u8]) -> std::result::Result<(), ring::error::Unspecified> {
                Err(ring::error::Unspecified)
            }
        }

        let (controller, _, surface) = setup("text");
        let controller = controller.with_entropy(Arc::new(Exhausted));
        let (outbox, inbox) = channel();

        let err = controller.open_document(uri(), &surface, inbox).unwrap_err();
        assert!(matches!(err, BridgeError::SandboxInit { .. }));
        assert_eq!(controller.session_count(), 0);
        assert!(surface.markup().is_none());
        assert!(outbox.is_closed());
    }

    #[tokio::test]
    async fn close_unknown_session_fails() {
        let (controller, _, surface) = setup("");
        let (_outbox, inbox) = channel();
        let id = controller.open_document(uri(), &surface, inbox).unwrap();
        controller.close_document(id).unwrap();
        assert!(matches!(
            controller.close_document(id),
            Err(BridgeError::SessionNotFound { .. })
        ));
        assert!(controller.handle_message(id, &json!({})).is_err());
    }

    #[tokio::test]
    async fn sessions_are_indexed_by_document() {
        let (controller, buffer, surface) = setup("a");
        let other = DocumentUri::parse("file:///graphs/b.wzrd").unwrap();
        buffer.open(other.clone(), "b");

        let (_o1, i1) = channel();
        let (_o2, i2) = channel();
        let (_o3, i3) = channel();
        let a1 = controller.open_document(uri(), &surface, i1).unwrap();
        let a2 = controller.open_document(uri(), &surface, i2).unwrap();
        let b1 = controller.open_document(other.clone(), &surface, i3).unwrap();

        assert_ne!(a1, a2);
        assert_eq!(controller.session_count(), 3);
        let mut on_a = controller.sessions_for(&uri());
        on_a.sort();
        let mut expected = vec![a1, a2];
        expected.sort();
        assert_eq!(on_a, expected);
        assert_eq!(controller.sessions_for(&other), vec![b1]);
        assert_eq!(controller.session(b1).unwrap().uri, other);
    }
}
