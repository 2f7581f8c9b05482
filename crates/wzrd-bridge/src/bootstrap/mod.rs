//! Sandbox bootstrapper.
//!
//! Builds everything a new surface receives before any renderer code runs:
//!
//! - **[`nonce`]** -- the per-session [`Nonce`].
//! - **[`policy`]** -- the [`ContentSecurityPolicy`] keyed to that nonce.
//! - **[`escape`]** -- escaping for each embedding context in the page.
//! - **[`markup`]** -- the typed [`MarkupBuilder`] assembling the page.
//!
//! The embedded document text is the only content the host ever sends into
//! a sandbox.

pub mod escape;
pub mod markup;
pub mod nonce;
pub mod policy;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ring::rand::SystemRandom;

pub use markup::{CONTENT_ACCESSOR, MarkupBuilder, RendererAssets, registers_worker};
pub use nonce::{EntropySource, Nonce};
pub use policy::ContentSecurityPolicy;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::sandbox::{SandboxOptions, SandboxSurface};

/// Output of one bootstrap.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub nonce: Nonce,
    pub policy: ContentSecurityPolicy,
    pub assets: RendererAssets,
    pub markup: String,
}

/// Produces bootstrap pages from a [`BridgeConfig`].
#[derive(Clone)]
pub struct Bootstrapper {
    config: BridgeConfig,
    extension_root: PathBuf,
    entropy: Arc<dyn EntropySource>,
}

impl fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("config", &self.config)
            .field("extension_root", &self.extension_root)
            .finish_non_exhaustive()
    }
}

impl Bootstrapper {
    /// `extension_root` is the host directory the configured asset root is
    /// relative to.
    pub fn new(config: BridgeConfig, extension_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            extension_root: extension_root.into(),
            entropy: Arc::new(SystemRandom::new()),
        }
    }

    /// Draw session nonces from `entropy` instead of the system CSPRNG.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn extension_root(&self) -> &Path {
        &self.extension_root
    }

    /// Surface options: scripts on, loads limited to the asset directory.
    pub fn sandbox_options(&self) -> SandboxOptions {
        SandboxOptions {
            enable_scripts: true,
            local_resource_roots: vec![self.config.assets.root.clone()],
        }
    }

    /// Map the loader, payload and worker into the surface's namespace.
    pub fn resolve_assets(&self, surface: &dyn SandboxSurface) -> Result<RendererAssets> {
        let (loader, payload, worker) = self.config.assets.local_paths(&self.extension_root);
        Ok(RendererAssets {
            loader: surface.resolve_resource(&loader)?,
            payload: surface.resolve_resource(&payload)?,
            worker: surface.resolve_resource(&worker)?,
        })
    }

    /// Build the page for a new session embedding `initial_text`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SandboxInit`](crate::BridgeError::SandboxInit) when no
    /// nonce can be drawn, or a resolution error for unreachable assets.
    pub fn bootstrap(&self, surface: &dyn SandboxSurface, initial_text: &str) -> Result<Bootstrap> {
        let nonce = Nonce::generate_with(self.entropy.as_ref())?;
        self.bootstrap_with(nonce, surface, initial_text)
    }

    /// [`bootstrap`](Self::bootstrap) with a caller-supplied nonce.
    pub fn bootstrap_with(
        &self,
        nonce: Nonce,
        surface: &dyn SandboxSurface,
        initial_text: &str,
    ) -> Result<Bootstrap> {
        let assets = self.resolve_assets(surface)?;
        let builder = MarkupBuilder::new(nonce, assets.clone())
            .initial_text(initial_text)
            .eval(self.config.policy.eval)
            .config(self.config.markup.clone());
        let markup = builder.render()?;

        tracing::trace!(
            markup_len = markup.len(),
            text_len = initial_text.len(),
            "bootstrap markup rendered"
        );

        Ok(Bootstrap {
            policy: builder.policy(),
            nonce: builder.nonce().clone(),
            assets,
            markup,
        })
    }
}
