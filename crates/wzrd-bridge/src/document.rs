//! Document adapter.
//!
//! The host's text buffer is the single source of truth for a document.  The
//! bridge only ever does two things with it: read the whole text (once, at
//! bootstrap) and replace the whole text (on every renderer update).
//!
//! Positions follow the editor convention of zero-based lines and columns.
//! Columns count Unicode scalar values; out-of-range positions clamp to the
//! end of their line or of the document.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{BridgeError, Result};

// ---------------------------------------------------------------------------
// Identifiers and positions
// ---------------------------------------------------------------------------

/// Stable identifier of a host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentUri(Url);

impl DocumentUri {
    /// Parse an absolute URI such as `file:///graphs/main.wzrd`.
    pub fn parse(uri: &str) -> Result<Self> {
        Url::parse(uri)
            .map(Self)
            .map_err(|e| BridgeError::InvalidUri {
                uri: uri.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Build a `file:` URI from an absolute filesystem path.
    pub fn from_file_path(path: &Path) -> Result<Self> {
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| BridgeError::InvalidUri {
                uri: path.display().to_string(),
                reason: "not an absolute path".into(),
            })
    }

    /// The underlying URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A zero-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Range `(0,0)..(line_count,0)` of `text`.
pub fn full_range_of(text: &str) -> TextRange {
    let line_count = text.matches('\n').count() + 1;
    TextRange::new(Position::new(0, 0), Position::new(line_count, 0))
}

/// Target of a [`ReplaceEdit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRange {
    /// Everything the document holds when the edit is applied.
    WholeDocument,
    /// A fixed span.
    Span(TextRange),
}

impl EditRange {
    /// The concrete span this range covers in `text`.
    pub fn resolve(self, text: &str) -> TextRange {
        match self {
            Self::WholeDocument => full_range_of(text),
            Self::Span(range) => range,
        }
    }
}

impl From<TextRange> for EditRange {
    fn from(range: TextRange) -> Self {
        Self::Span(range)
    }
}

/// One replace operation submitted to the host's edit transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceEdit {
    pub uri: DocumentUri,
    pub range: EditRange,
    pub text: String,
}

impl ReplaceEdit {
    /// Result of applying this edit to `current`.  A
    /// [`WholeDocument`](EditRange::WholeDocument) range is measured against
    /// `current` itself, so hosts must call this on the text they are about
    /// to overwrite.
    pub fn apply_to(&self, current: &str) -> String {
        apply_range(current, self.range.resolve(current), &self.text)
    }
}

/// Apply `edit_range → replacement` to `text`, clamping out-of-range
/// positions.  Hosts backed by plain strings use this to honour a
/// [`ReplaceEdit`].
pub fn apply_range(text: &str, edit_range: TextRange, replacement: &str) -> String {
    let start = offset_at(text, edit_range.start);
    let end = offset_at(text, edit_range.end).max(start);

    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

/// Byte offset of `pos` in `text`.
fn offset_at(text: &str, pos: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..pos.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);
    text[line_start..line_end]
        .char_indices()
        .nth(pos.character)
        .map_or(line_end, |(i, _)| line_start + i)
}

// ---------------------------------------------------------------------------
// Document snapshot
// ---------------------------------------------------------------------------

/// A point-in-time copy of a host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: DocumentUri,
    text: String,
}

impl Document {
    pub fn new(uri: DocumentUri, text: impl Into<String>) -> Self {
        Self {
            uri,
            text: text.into(),
        }
    }

    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of lines; an empty document has one.
    pub fn line_count(&self) -> usize {
        self.text.matches('\n').count() + 1
    }

    /// Range covering the whole document: `(0,0)` to `(line_count,0)`.
    pub fn full_range(&self) -> TextRange {
        full_range_of(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Host buffer seam
// ---------------------------------------------------------------------------

/// The host's text buffer.
///
/// `apply_edit` returns `Ok(false)` when the host declines the edit.  The
/// edit's range must be resolved against the text it replaces, in the same
/// transaction as the write.
#[async_trait]
pub trait TextBuffer: Send + Sync {
    /// Current text of the document.
    fn text(&self, uri: &DocumentUri) -> Result<String>;

    /// Apply one edit as a transaction.
    async fn apply_edit(&self, edit: ReplaceEdit) -> Result<bool>;
}

/// In-memory [`TextBuffer`] keyed by document identifier.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    docs: DashMap<DocumentUri, String>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a document.
    pub fn open(&self, uri: DocumentUri, text: impl Into<String>) {
        self.docs.insert(uri, text.into());
    }

    /// Drop a document; later edits to it are declined.
    pub fn close(&self, uri: &DocumentUri) -> Option<String> {
        self.docs.remove(uri).map(|(_, text)| text)
    }

    pub fn get(&self, uri: &DocumentUri) -> Option<String> {
        self.docs.get(uri).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl TextBuffer for MemoryBuffer {
    fn text(&self, uri: &DocumentUri) -> Result<String> {
        self.get(uri).ok_or_else(|| BridgeError::DocumentNotFound {
            uri: uri.to_string(),
        })
    }

    async fn apply_edit(&self, edit: ReplaceEdit) -> Result<bool> {
        let Some(mut entry) = self.docs.get_mut(&edit.uri) else {
            return Ok(false);
        };
        let updated = edit.apply_to(entry.value());
        *entry.value_mut() = updated;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Read / full-replace access to one document.
#[derive(Clone)]
pub struct DocumentAdapter {
    uri: DocumentUri,
    buffer: Arc<dyn TextBuffer>,
}

impl fmt::Debug for DocumentAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentAdapter")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

impl DocumentAdapter {
    pub fn new(uri: DocumentUri, buffer: Arc<dyn TextBuffer>) -> Self {
        Self { uri, buffer }
    }

    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// Snapshot the current document.
    pub fn read(&self) -> Result<Document> {
        let text = self.buffer.text(&self.uri)?;
        Ok(Document::new(self.uri.clone(), text))
    }

    /// Build the edit that discards whatever the document holds when it is
    /// applied and substitutes `text`.
    ///
    /// Fails if the document cannot be read now.
    pub fn full_replace(&self, text: impl Into<String>) -> Result<ReplaceEdit> {
        self.buffer.text(&self.uri)?;
        Ok(ReplaceEdit {
            uri: self.uri.clone(),
            range: EditRange::WholeDocument,
            text: text.into(),
        })
    }

    /// Submit a full replace without waiting for the host to apply it.
    ///
    /// Must be called within a Tokio runtime.  The returned [`PendingEdit`]
    /// may be dropped; the edit still runs to completion.
    pub fn replace_all(&self, text: impl Into<String>) -> Result<PendingEdit> {
        let edit = self.full_replace(text)?;
        let buffer = Arc::clone(&self.buffer);

        let handle = tokio::spawn(async move {
            let uri = edit.uri.clone();
            let len = edit.text.len();
            match buffer.apply_edit(edit).await {
                Ok(true) => {
                    tracing::debug!(uri = %uri, len, "full replace applied");
                    true
                }
                Ok(false) => {
                    tracing::warn!(uri = %uri, "host declined full replace");
                    false
                }
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "full replace failed");
                    false
                }
            }
        });

        Ok(PendingEdit { handle })
    }
}

/// An edit submitted to the host whose outcome nobody is required to await.
#[derive(Debug)]
pub struct PendingEdit {
    handle: JoinHandle<bool>,
}

impl PendingEdit {
    /// Wait for the host and report whether the edit was applied.
    pub async fn settled(self) -> bool {
        self.handle.await.unwrap_or(false)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> DocumentUri {
        DocumentUri::parse("file:///graphs/main.wzrd").unwrap()
    }

    #[test]
    fn line_count_counts_newlines() {
        assert_eq!(Document::new(uri(), "").line_count(), 1);
        assert_eq!(Document::new(uri(), "a").line_count(), 1);
        assert_eq!(Document::new(uri(), "a\n").line_count(), 2);
        assert_eq!(Document::new(uri(), "a\nb\nc").line_count(), 3);
    }

    #[test]
    fn full_range_spans_past_last_line() {
        let doc = Document::new(uri(), "a\nb");
        assert_eq!(
            doc.full_range(),
            TextRange::new(Position::new(0, 0), Position::new(2, 0))
        );
    }

    #[test]
    fn apply_range_full_document() {
        let doc = Document::new(uri(), "node a\nnode b\n");
        assert_eq!(apply_range(doc.text(), doc.full_range(), "x"), "x");
    }

    #[test]
    fn apply_range_partial() {
        let range = TextRange::new(Position::new(1, 0), Position::new(1, 3));
        assert_eq!(apply_range("abc\ndef\nghi", range, "XY"), "abc\nXY\nghi");
    }

    #[test]
    fn apply_range_clamps_columns_and_multibyte() {
        let range = TextRange::new(Position::new(0, 1), Position::new(0, 99));
        assert_eq!(apply_range("héllo\nrest", range, "!"), "h!\nrest");
    }

    #[test]
    fn invalid_uri_is_rejected() {
        let err = DocumentUri::parse("not a uri").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUri { .. }));
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(DocumentUri::from_file_path(Path::new("relative/doc.wzrd")).is_err());
    }

    #[tokio::test]
    async fn memory_buffer_declines_unknown_document() {
        let buffer = MemoryBuffer::new();
        let edit = ReplaceEdit {
            uri: uri(),
            range: EditRange::WholeDocument,
            text: "x".into(),
        };
        assert!(!buffer.apply_edit(edit).await.unwrap());
        assert!(buffer.text(&uri()).is_err());
    }

    #[tokio::test]
    async fn replace_all_overwrites_whole_document() {
        let buffer = Arc::new(MemoryBuffer::new());
        buffer.open(uri(), "line 1\nline 2\nline 3");
        let adapter = DocumentAdapter::new(uri(), buffer.clone());

        let pending = adapter.replace_all("graph {}").unwrap();
        assert!(pending.settled().await);
        assert_eq!(adapter.read().unwrap().text(), "graph {}");
    }

    #[test]
    fn whole_document_range_is_measured_at_apply_time() {
        let edit = ReplaceEdit {
            uri: uri(),
            range: EditRange::WholeDocument,
            text: "q".into(),
        };
        // Text that grew after the edit was built is still replaced entirely.
        assert_eq!(edit.apply_to("a"), "q");
        assert_eq!(edit.apply_to("x\ny\nz"), "q");
        assert_eq!(edit.apply_to(""), "q");
    }

    #[tokio::test]
    async fn queued_full_replaces_never_mix_payloads() {
        let buffer = Arc::new(MemoryBuffer::new());
        buffer.open(uri(), "a");
        let adapter = DocumentAdapter::new(uri(), buffer.clone());

        // Both edits are built before either lands.
        let first = adapter.replace_all("x\ny\nz").unwrap();
        let second = adapter.replace_all("q").unwrap();
        assert!(first.settled().await);
        assert!(second.settled().await);

        let text = buffer.get(&uri()).unwrap();
        assert!(text == "q" || text == "x\ny\nz", "mixed content: {text:?}");
    }

    #[tokio::test]
    async fn full_replace_of_missing_document_fails() {
        let adapter = DocumentAdapter::new(uri(), Arc::new(MemoryBuffer::new()));
        assert!(matches!(
            adapter.full_replace("x"),
            Err(BridgeError::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn edit_for_closed_document_is_declined() {
        let buffer = Arc::new(MemoryBuffer::new());
        buffer.open(uri(), "old");
        let adapter = DocumentAdapter::new(uri(), buffer.clone());

        let edit = adapter.full_replace("new").unwrap();
        buffer.close(&uri());
        assert!(!buffer.apply_edit(edit).await.unwrap());
    }
}
