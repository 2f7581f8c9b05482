//! Execution policy for the sandbox page.

use std::fmt;

use crate::bootstrap::nonce::Nonce;
use crate::config::EvalException;

/// An ordered Content-Security-Policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<(String, Vec<String>)>,
}

impl ContentSecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directive with its source list.
    pub fn directive<I, S>(mut self, name: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives
            .push((name.into(), sources.into_iter().map(Into::into).collect()));
        self
    }

    /// The policy for one renderer session.
    ///
    /// Nothing loads by default.  Inline styles and scripts run only with the
    /// session nonce; `eval` is the loader's single dynamic-evaluation
    /// exception; network access and external scripts require `https:`.
    pub fn for_session(nonce: &Nonce, eval: EvalException) -> Self {
        let nonce_src = nonce_source(nonce);
        Self::new()
            .directive("default-src", ["'none'"])
            .directive("style-src", [nonce_src.as_str()])
            .directive("script-src", [nonce_src.as_str(), eval.source_expression()])
            .directive("connect-src", ["https:"])
            .directive("script-src-elem", [nonce_src.as_str(), "https:"])
    }

    /// Sources listed for `name`, if the directive is present.
    pub fn sources(&self, name: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(directive, _)| directive == name)
            .map(|(_, sources)| sources.as_slice())
    }
}

impl fmt::Display for ContentSecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, sources)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            for source in sources {
                write!(f, " {source}")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}

/// `'nonce-<token>'`
pub fn nonce_source(nonce: &Nonce) -> String {
    format!("'nonce-{nonce}'")
}
