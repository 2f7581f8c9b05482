//! Per-session nonce.
//!
//! Drawn from the operating system CSPRNG via `ring`, 256 bits, encoded as
//! URL-safe base64 without padding so it is valid both as a CSP
//! `nonce-source` and inside an HTML attribute without escaping.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{BridgeError, Result};

/// Number of random bytes in a nonce.
pub const NONCE_BYTES: usize = 32;

/// Source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), ring::error::Unspecified>;
}

impl EntropySource for SystemRandom {
    fn fill(&self, dest: &mut [u8]) -> std::result::Result<(), ring::error::Unspecified> {
        SecureRandom::fill(self, dest)
    }
}

/// A single-session token authorizing inline code under the policy.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Draw a fresh nonce from the system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SandboxInit`] if the random source fails; no
    /// policy can be issued without a nonce.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&SystemRandom::new())
    }

    /// Draw a nonce from a specific random source.
    pub fn generate_with(rng: &dyn EntropySource) -> Result<Self> {
        let mut bytes = [0u8; NONCE_BYTES];
        rng.fill(&mut bytes).map_err(|_| BridgeError::SandboxInit {
            reason: "failed to generate random nonce".into(),
        })?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Keep the token out of logs.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}
