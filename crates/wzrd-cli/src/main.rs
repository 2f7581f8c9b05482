//! CLI entry point for the Wzrd graph editor bridge.
//!
//! The `wzrd` binary acts as a minimal file-backed host: it can render the
//! bootstrap page a sandbox would receive for a document, and replay
//! recorded sandbox messages against a document on disk.

mod fs_buffer;
mod replay;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;
use wzrd_bridge::{
    BridgeConfig, BridgeController, DocumentUri, MappedSurface, SessionId, channel,
};

use crate::fs_buffer::FileBuffer;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Wzrd graph editor bridge host.
#[derive(Parser)]
#[command(name = "wzrd", version, about = "Wzrd graph editor bridge host")]
struct Cli {
    /// Bridge configuration file (TOML).  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the renderer asset root is relative to.
    #[arg(long, global = true, default_value = ".")]
    extension_root: PathBuf,

    /// Address the extension root is served from inside the sandbox.
    #[arg(long, global = true, default_value = "https://wzrd.sandbox.localhost/")]
    base_url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bootstrap page for a document.
    Render {
        /// Document to embed.
        document: PathBuf,
    },

    /// Apply newline-delimited sandbox messages to a document.
    Replay {
        /// Document to update.
        document: PathBuf,

        /// Message file; stdin when omitted.
        #[arg(long)]
        messages: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info");

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    let root = std::fs::canonicalize(&cli.extension_root).with_context(|| {
        format!("extension root {} not found", cli.extension_root.display())
    })?;

    let host = Host {
        controller: BridgeController::new(config, &root, Arc::new(FileBuffer::new())),
        surface: MappedSurface::new(&root, cli.base_url),
    };

    match cli.command {
        Commands::Render { document } => cmd_render(&host, &document),
        Commands::Replay { document, messages } => {
            cmd_replay(&host, &document, messages.as_deref()).await
        }
    }
}

struct Host {
    controller: BridgeController,
    surface: MappedSurface,
}

impl Host {
    fn open(&self, document: &Path) -> Result<SessionId> {
        let path = std::fs::canonicalize(document)
            .with_context(|| format!("document {} not found", document.display()))?;
        let uri = DocumentUri::from_file_path(&path)?;
        // The CLI is the only sender; the sandbox end stays unused.
        let (_outbox, inbox) = channel();
        let id = self
            .controller
            .open_document(uri, &self.surface, inbox)
            .context("failed to open document session")?;
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_render(host: &Host, document: &Path) -> Result<()> {
    let id = host.open(document)?;
    let markup = host
        .surface
        .markup()
        .context("bootstrap produced no markup")?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(markup.as_bytes())?;
    stdout.flush()?;

    host.controller.close_document(id)?;
    Ok(())
}

async fn cmd_replay(host: &Host, document: &Path, messages: Option<&Path>) -> Result<()> {
    let id = host.open(document)?;

    let summary = match messages {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            replay::replay(&host.controller, id, BufReader::new(file)).await?
        }
        None => replay::replay(&host.controller, id, io::stdin().lock()).await?,
    };

    info!(
        applied = summary.applied,
        declined = summary.declined,
        ignored = summary.ignored,
        "replay finished"
    );

    host.controller.close_document(id)?;
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
