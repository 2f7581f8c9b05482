//! File-backed [`TextBuffer`].
//!
//! Documents are `file:` URIs; an edit rewrites the whole file.  Edits are
//! applied one at a time so each read-modify-write sees the previous write.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wzrd_bridge::{BridgeError, DocumentUri, ReplaceEdit, Result, TextBuffer};

/// Host buffer that reads and writes documents straight from disk.
#[derive(Debug, Default)]
pub struct FileBuffer {
    writes: Mutex<()>,
}

impl FileBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn local_path(uri: &DocumentUri) -> Result<PathBuf> {
    uri.as_url()
        .to_file_path()
        .map_err(|()| BridgeError::DocumentNotFound {
            uri: uri.to_string(),
        })
}

fn buffer_error(uri: &DocumentUri, err: std::io::Error) -> BridgeError {
    if err.kind() == ErrorKind::NotFound {
        BridgeError::DocumentNotFound {
            uri: uri.to_string(),
        }
    } else {
        BridgeError::Buffer {
            uri: uri.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl TextBuffer for FileBuffer {
    fn text(&self, uri: &DocumentUri) -> Result<String> {
        let path = local_path(uri)?;
        std::fs::read_to_string(&path).map_err(|e| buffer_error(uri, e))
    }

    async fn apply_edit(&self, edit: ReplaceEdit) -> Result<bool> {
        let path = local_path(&edit.uri)?;
        let _write = self.writes.lock().await;

        let current = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| buffer_error(&edit.uri, e))?;
        let updated = edit.apply_to(&current);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| buffer_error(&edit.uri, e))?;
        tracing::debug!(path = %path.display(), "document written");
        Ok(true)
    }
}
