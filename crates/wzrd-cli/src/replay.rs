//! Replay recorded sandbox messages against a document.
//!
//! Input is newline-delimited JSON, one message per line, exactly as the
//! renderer posts them.  Unlike the session pump, replay waits for each edit
//! so the file is settled before the next line is read.

use std::io::BufRead;

use anyhow::{Context, Result};
use serde_json::Value;
use wzrd_bridge::{BridgeController, Dispatch, SessionId};

/// Counts of what a replay did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub declined: usize,
    pub ignored: usize,
}

/// Feed every line of `input` to session `id`.
pub async fn replay(
    controller: &BridgeController,
    id: SessionId,
    input: impl BufRead,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read message line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(line = index + 1, error = %e, "skipping non-JSON line");
                summary.ignored += 1;
                continue;
            }
        };

        match controller.handle_message(id, &raw)? {
            Dispatch::Applied(pending) => {
                if pending.settled().await {
                    summary.applied += 1;
                } else {
                    summary.declined += 1;
                }
            }
            Dispatch::Ignored(_) => summary.ignored += 1,
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use url::Url;
    use wzrd_bridge::{BridgeConfig, DocumentUri, MappedSurface, MemoryBuffer, channel};

    use super::*;

    #[tokio::test]
    async fn replays_updates_and_skips_noise() {
        let uri = DocumentUri::parse("file:///w/flow.wzrd").unwrap();
        let buffer = Arc::new(MemoryBuffer::new());
        buffer.open(uri.clone(), "start");
        let controller = BridgeController::new(BridgeConfig::default(), "/ext", buffer.clone());
        let surface = MappedSurface::new("/ext", Url::parse("https://assets.example/").unwrap());
        let (_outbox, inbox) = channel();
        let id = controller.open_document(uri.clone(), &surface, inbox).unwrap();

        let input = Cursor::new(
            "{\"type\":\"updateDocument\",\"data\":\"one\"}\n\
             \n\
             not json\n\
             {\"type\":\"zoom\",\"data\":2}\n\
             {\"type\":\"updateDocument\",\"data\":\"two\\nlines\"}\n",
        );
        let summary = replay(&controller, id, input).await.unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                applied: 2,
                declined: 0,
                ignored: 2
            }
        );
        assert_eq!(buffer.get(&uri).as_deref(), Some("two\nlines"));
    }
}
