//! Bridge configuration.
//!
//! [`BridgeConfig`] names the renderer assets, the markup constants the
//! renderer binary expects, and the one dynamic-evaluation exception granted
//! by the execution policy.  Every field has a default matching the shipped
//! renderer, so an empty TOML file is a valid configuration.
//!
//! ```toml
//! [assets]
//! root = "dist/lib"
//!
//! [markup]
//! dev_marker = "dev"
//!
//! [policy]
//! eval = "wasm-unsafe-eval"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level bridge settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Renderer asset locations.
    pub assets: AssetConfig,
    /// Constants baked into the bootstrap markup.
    pub markup: MarkupConfig,
    /// Execution policy knobs.
    pub policy: PolicyConfig,
}

/// Where the renderer's files live, relative to the host extension root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding all renderer files.  This is also the only local
    /// resource root the sandbox may load from.
    pub root: PathBuf,
    /// JavaScript loader for the renderer binary.
    pub loader: String,
    /// Compiled renderer binary.
    pub payload: String,
    /// Offline-caching worker script.
    pub worker: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dist/lib"),
            loader: "graph_editor.js".into(),
            payload: "graph_editor_bg.wasm".into(),
            worker: "sw.js".into(),
        }
    }
}

impl AssetConfig {
    /// Local paths of `(loader, payload, worker)` under `extension_root`.
    pub fn local_paths(&self, extension_root: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let dir = extension_root.join(&self.root);
        (
            dir.join(&self.loader),
            dir.join(&self.payload),
            dir.join(&self.worker),
        )
    }
}

/// Fixed strings shared between the markup and the renderer binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Page title.
    pub title: String,
    /// Id of the canvas element the renderer binary looks up.
    pub canvas_id: String,
    /// Location fragment (without `#`) that disables worker registration.
    pub dev_marker: String,
    /// Global function that hands the sandbox its host messaging object.
    pub host_api: String,
    /// Logical module name the import map binds to the loader.
    pub module_name: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            title: "Wzrd Graph Editor".into(),
            canvas_id: "WzrdGraphEditor".into(),
            dev_marker: "dev".into(),
            host_api: "acquireVsCodeApi".into(),
            module_name: "wasmJs".into(),
        }
    }
}

/// Execution policy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Dynamic-evaluation source expression added to `script-src`.
    pub eval: EvalException,
}

/// The single dynamic-code-evaluation exception the renderer loader needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalException {
    /// `'unsafe-eval'`: what the shipped loader was built against.
    #[default]
    #[serde(rename = "unsafe-eval")]
    UnsafeEval,
    /// `'wasm-unsafe-eval'`: only WebAssembly compilation is allowed.
    #[serde(rename = "wasm-unsafe-eval")]
    WasmUnsafeEval,
}

impl EvalException {
    /// The CSP source expression, quotes included.
    pub fn source_expression(self) -> &'static str {
        match self {
            Self::UnsafeEval => "'unsafe-eval'",
            Self::WasmUnsafeEval => "'wasm-unsafe-eval'",
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text.  Missing keys keep defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "bridge configuration loaded");
        Ok(config)
    }

    /// Set the renderer asset directory.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets.root = root.into();
        self
    }

    /// Set the development fragment marker.
    pub fn with_dev_marker(mut self, marker: impl Into<String>) -> Self {
        self.markup.dev_marker = marker.into();
        self
    }

    /// Set the canvas element id.
    pub fn with_canvas_id(mut self, id: impl Into<String>) -> Self {
        self.markup.canvas_id = id.into();
        self
    }

    /// Choose the dynamic-evaluation exception.
    pub fn with_eval(mut self, eval: EvalException) -> Self {
        self.policy.eval = eval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.assets.root, PathBuf::from("dist/lib"));
        assert_eq!(cfg.assets.loader, "graph_editor.js");
        assert_eq!(cfg.assets.payload, "graph_editor_bg.wasm");
        assert_eq!(cfg.assets.worker, "sw.js");
        assert_eq!(cfg.markup.canvas_id, "WzrdGraphEditor");
        assert_eq!(cfg.markup.dev_marker, "dev");
        assert_eq!(cfg.policy.eval, EvalException::UnsafeEval);
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let cfg = BridgeConfig::from_toml_str(
            r#"
            [assets]
            root = "out/renderer"

            [markup]
            dev_marker = "hot"

            [policy]
            eval = "wasm-unsafe-eval"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.assets.root, PathBuf::from("out/renderer"));
        assert_eq!(cfg.assets.loader, "graph_editor.js");
        assert_eq!(cfg.markup.dev_marker, "hot");
        assert_eq!(cfg.markup.title, "Wzrd Graph Editor");
        assert_eq!(cfg.policy.eval, EvalException::WasmUnsafeEval);
    }

    #[test]
    fn unknown_eval_is_rejected() {
        let err = BridgeConfig::from_toml_str("[policy]\neval = \"anything\"\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "[markup]\ncanvas_id = \"Graph\"\n").unwrap();
        let cfg = BridgeConfig::load(&path).unwrap();
        assert_eq!(cfg.markup.canvas_id, "Graph");
    }

    #[test]
    fn builder_chaining() {
        let cfg = BridgeConfig::new()
            .with_asset_root("lib")
            .with_dev_marker("local")
            .with_canvas_id("Canvas")
            .with_eval(EvalException::WasmUnsafeEval);
        assert_eq!(cfg.assets.root, PathBuf::from("lib"));
        assert_eq!(cfg.markup.dev_marker, "local");
        assert_eq!(cfg.markup.canvas_id, "Canvas");
        assert_eq!(cfg.policy.eval.source_expression(), "'wasm-unsafe-eval'");
    }

    #[test]
    fn asset_local_paths() {
        let (loader, payload, worker) =
            AssetConfig::default().local_paths(Path::new("/ext"));
        assert_eq!(loader, PathBuf::from("/ext/dist/lib/graph_editor.js"));
        assert_eq!(payload, PathBuf::from("/ext/dist/lib/graph_editor_bg.wasm"));
        assert_eq!(worker, PathBuf::from("/ext/dist/lib/sw.js"));
    }
}
