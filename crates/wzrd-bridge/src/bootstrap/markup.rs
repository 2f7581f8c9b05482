//! Typed builder for the sandbox bootstrap page.
//!
//! Every value that reaches the page goes through [`escape`](super::escape)
//! for the context it lands in.  The policy is always derived from the
//! builder's own nonce, so the two cannot disagree.

use std::fmt::Write as _;

use url::Url;

use crate::bootstrap::escape::{html_attribute, script_json, script_string};
use crate::bootstrap::nonce::Nonce;
use crate::bootstrap::policy::ContentSecurityPolicy;
use crate::config::{EvalException, MarkupConfig};
use crate::error::{BridgeError, Result};
use crate::protocol::UPDATE_DOCUMENT;

/// Name of the accessor the renderer calls once to obtain the initial text.
pub const CONTENT_ACCESSOR: &str = "getFileContents";

/// Resolved addresses of the renderer's files inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererAssets {
    /// Loader script, bound in the import map.
    pub loader: Url,
    /// Compiled renderer binary the loader is started against.
    pub payload: Url,
    /// Offline-caching worker script.
    pub worker: Url,
}

/// `location.hash` value that disables worker registration.
pub fn dev_fragment(dev_marker: &str) -> String {
    format!("#{dev_marker}")
}

/// Whether the page registers its offline worker for a given
/// `location.hash`.  Mirrors the guard emitted into the page.
pub fn registers_worker(location_hash: &str, dev_marker: &str) -> bool {
    location_hash != dev_fragment(dev_marker)
}

const PAGE_STYLE: &str = "
    html {
      touch-action: manipulation;
    }
    body {
      background: #909090;
    }
    @media (prefers-color-scheme: dark) {
      body {
        background: #404040;
      }
    }
    html,
    body {
      overflow: hidden;
      margin: 0 !important;
      padding: 0 !important;
      height: 100%;
      width: 100%;
    }
    canvas {
      margin-right: auto;
      margin-left: auto;
      display: block;
      position: absolute;
      top: 0%;
      left: 50%;
      transform: translate(-50%, 0%);
    }
";

/// Builder for the bootstrap page of one session.
#[derive(Debug, Clone)]
pub struct MarkupBuilder {
    nonce: Nonce,
    assets: RendererAssets,
    initial_text: String,
    eval: EvalException,
    config: MarkupConfig,
}

impl MarkupBuilder {
    pub fn new(nonce: Nonce, assets: RendererAssets) -> Self {
        Self {
            nonce,
            assets,
            initial_text: String::new(),
            eval: EvalException::default(),
            config: MarkupConfig::default(),
        }
    }

    /// Document text handed to the renderer through [`CONTENT_ACCESSOR`].
    pub fn initial_text(mut self, text: impl Into<String>) -> Self {
        self.initial_text = text.into();
        self
    }

    pub fn eval(mut self, eval: EvalException) -> Self {
        self.eval = eval;
        self
    }

    pub fn config(mut self, config: MarkupConfig) -> Self {
        self.config = config;
        self
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// The policy the page declares.
    pub fn policy(&self) -> ContentSecurityPolicy {
        ContentSecurityPolicy::for_session(&self.nonce, self.eval)
    }

    /// Render the page.
    ///
    /// # Errors
    ///
    /// Fails if the configured host API name is not a plain identifier, since
    /// it is emitted as code.
    pub fn render(&self) -> Result<String> {
        let cfg = &self.config;
        if !is_identifier(&cfg.host_api) {
            return Err(BridgeError::SandboxInit {
                reason: format!("host api `{}` is not a JavaScript identifier", cfg.host_api),
            });
        }

        let nonce = html_attribute(self.nonce.as_str());
        let import_map = serde_json::json!({
            "imports": { cfg.module_name.as_str(): self.assets.loader.as_str() }
        });

        let mut page = String::with_capacity(4096 + self.initial_text.len());
        // Writing into a String cannot fail.
        let _ = write!(
            page,
            r##"<!DOCTYPE html>
<html>
<head>
  <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0, user-scalable=no">
  <meta http-equiv="Content-Security-Policy" content="{policy}">
  <title>{title}</title>
  <script nonce="{nonce}" type="importmap">{import_map}</script>
  <script nonce="{nonce}" type="module">
    import init from {module_name};
    init({payload_js});
  </script>
  <meta name="theme-color" media="(prefers-color-scheme: light)" content="white">
  <meta name="theme-color" media="(prefers-color-scheme: dark)" content="#404040">
  <style nonce="{nonce}">{style}</style>
  <link rel="preload" href="{payload_attr}" as="fetch" type="application/wasm" crossorigin="">
  <link rel="modulepreload" href="{loader_attr}">
</head>
<body>
<canvas id="{canvas_id}"></canvas>
<script nonce="{nonce}">
  const hostApi = {host_api}();

  function updateDocument(str) {{
    hostApi.postMessage({{ type: {update_tag}, data: str }});
  }}

  const initialContents = {initial_text};

  function {accessor}() {{
    return initialContents;
  }}

  if ('serviceWorker' in navigator && window.location.hash !== {dev_fragment}) {{
    window.addEventListener('load', function () {{
      navigator.serviceWorker.register({worker_js});
    }});
  }}
</script>
</body>
</html>
"##,
            policy = html_attribute(&self.policy().to_string()),
            title = html_attribute(&cfg.title),
            import_map = script_json(&import_map)?,
            module_name = script_string(&cfg.module_name)?,
            payload_js = script_string(self.assets.payload.as_str())?,
            style = PAGE_STYLE,
            payload_attr = html_attribute(self.assets.payload.as_str()),
            loader_attr = html_attribute(self.assets.loader.as_str()),
            canvas_id = html_attribute(&cfg.canvas_id),
            host_api = cfg.host_api,
            update_tag = script_string(UPDATE_DOCUMENT)?,
            initial_text = script_string(&self.initial_text)?,
            accessor = CONTENT_ACCESSOR,
            dev_fragment = script_string(&dev_fragment(&cfg.dev_marker))?,
            worker_js = script_string(self.assets.worker.as_str())?,
        );
        Ok(page)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
