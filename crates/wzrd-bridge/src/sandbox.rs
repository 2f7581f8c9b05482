//! Host-side seams for the sandboxed surface.
//!
//! The host owns the surface's lifetime.  The bridge only configures it,
//! asks it to map local renderer files to addresses it can load, installs the
//! bootstrap markup, and listens on the message channel.
//!
//! [`channel`] creates the message channel: the [`Outbox`] end belongs to the
//! sandbox (the renderer's `postMessage`), the [`Inbox`] end to the host.

use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{BridgeError, Result};

/// Options applied to a surface before any markup is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOptions {
    /// Whether scripts may run at all.
    pub enable_scripts: bool,
    /// Local directories the surface may load files from.  Relative entries
    /// are resolved against the host extension root.
    pub local_resource_roots: Vec<PathBuf>,
}

/// A sandboxed rendering surface provided by the host.
pub trait SandboxSurface: Send + Sync {
    /// Apply options.  Called once, before [`set_markup`](Self::set_markup).
    fn configure(&self, options: SandboxOptions);

    /// Map a local file to an address reachable from inside the surface.
    fn resolve_resource(&self, path: &Path) -> Result<Url>;

    /// Install the page the surface renders.
    fn set_markup(&self, markup: String);
}

// ---------------------------------------------------------------------------
// Message channel
// ---------------------------------------------------------------------------

/// Create a sandbox → host message channel.
pub fn channel() -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, Inbox { rx })
}

/// Sandbox end of the channel.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Value>,
}

impl Outbox {
    /// Post one message.  Returns `false` once the host has deregistered.
    pub fn post(&self, message: Value) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Whether the host end is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Host end of the channel.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Inbox {
    /// Next message in arrival order, or `None` when every outbox is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// URL-mapped surface
// ---------------------------------------------------------------------------

/// A [`SandboxSurface`] that serves files under an extension root from a
/// fixed base URL and records what the bridge installs.
///
/// Only files inside the configured local resource roots resolve.
#[derive(Debug)]
pub struct MappedSurface {
    extension_root: PathBuf,
    base: Url,
    options: Mutex<SandboxOptions>,
    markup: Mutex<Option<String>>,
}

impl MappedSurface {
    /// `base` must be a hierarchical URL, e.g. `https://assets.example/ext/`.
    pub fn new(extension_root: impl Into<PathBuf>, base: Url) -> Self {
        Self {
            extension_root: extension_root.into(),
            base,
            options: Mutex::new(SandboxOptions::default()),
            markup: Mutex::new(None),
        }
    }

    pub fn extension_root(&self) -> &Path {
        &self.extension_root
    }

    /// Options most recently applied.
    pub fn options(&self) -> SandboxOptions {
        self.options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Markup most recently installed.
    pub fn markup(&self) -> Option<String> {
        self.markup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_allowed(&self, path: &Path) -> bool {
        self.options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .local_resource_roots
            .iter()
            .any(|root| path.starts_with(self.extension_root.join(root)))
    }
}

impl SandboxSurface for MappedSurface {
    fn configure(&self, options: SandboxOptions) {
        tracing::debug!(
            enable_scripts = options.enable_scripts,
            roots = options.local_resource_roots.len(),
            "sandbox surface configured"
        );
        *self.options.lock().unwrap_or_else(PoisonError::into_inner) = options;
    }

    fn resolve_resource(&self, path: &Path) -> Result<Url> {
        let reject = |reason: &str| BridgeError::ResourceResolution {
            path: path.to_path_buf(),
            reason: reason.to_owned(),
        };

        if !self.is_allowed(path) {
            return Err(reject("outside local resource roots"));
        }
        let relative = path
            .strip_prefix(&self.extension_root)
            .map_err(|_| reject("outside extension root"))?;

        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| reject("base url cannot carry a path"))?;
            segments.pop_if_empty();
            for component in relative.components() {
                match component {
                    Component::Normal(part) => {
                        segments.push(&part.to_string_lossy());
                    }
                    _ => return Err(reject("path is not normalized")),
                }
            }
        }
        Ok(url)
    }

    fn set_markup(&self, markup: String) {
        tracing::trace!(len = markup.len(), "sandbox markup installed");
        *self.markup.lock().unwrap_or_else(PoisonError::into_inner) = Some(markup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn surface() -> MappedSurface {
        let surface = MappedSurface::new(
            "/ext",
            Url::parse("https://assets.example/ext/").unwrap(),
        );
        surface.configure(SandboxOptions {
            enable_scripts: true,
            local_resource_roots: vec![PathBuf::from("dist/lib")],
        });
        surface
    }

    #[test]
    fn resolves_file_inside_root() {
        let url = surface()
            .resolve_resource(Path::new("/ext/dist/lib/graph_editor.js"))
            .unwrap();
        assert_eq!(url.as_str(), "https://assets.example/ext/dist/lib/graph_editor.js");
    }

    #[test]
    fn percent_encodes_segments() {
        let url = surface()
            .resolve_resource(Path::new("/ext/dist/lib/my file#1.js"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://assets.example/ext/dist/lib/my%20file%231.js"
        );
    }

    #[test]
    fn rejects_file_outside_roots() {
        let err = surface()
            .resolve_resource(Path::new("/ext/secrets.toml"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ResourceResolution { .. }));
    }

    #[test]
    fn rejects_parent_traversal() {
        let err = surface()
            .resolve_resource(Path::new("/ext/dist/lib/../../secrets.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("not normalized"));
    }

    #[test]
    fn unconfigured_surface_resolves_nothing() {
        let surface = MappedSurface::new("/ext", Url::parse("https://a.example/").unwrap());
        assert!(surface
            .resolve_resource(Path::new("/ext/dist/lib/sw.js"))
            .is_err());
    }

    #[test]
    fn records_markup() {
        let surface = surface();
        assert!(surface.markup().is_none());
        surface.set_markup("<html></html>".into());
        assert_eq!(surface.markup().as_deref(), Some("<html></html>"));
    }

    #[tokio::test]
    async fn channel_preserves_arrival_order() {
        let (outbox, mut inbox) = channel();
        for i in 0..5 {
            assert!(outbox.post(json!({ "seq": i })));
        }
        for i in 0..5 {
            assert_eq!(inbox.recv().await, Some(json!({ "seq": i })));
        }
    }

    #[tokio::test]
    async fn outbox_sees_deregistration() {
        let (outbox, inbox) = channel();
        drop(inbox);
        assert!(outbox.is_closed());
        assert!(!outbox.post(json!({})));
    }
}
