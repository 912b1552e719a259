//! Credential tokens and parsing of the configured token list

use std::fmt;

use common::Secret;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Number of leading characters shown in a credential preview.
const PREVIEW_CHARS: usize = 10;

/// Hex characters kept from the SHA-256 digest for a fingerprint.
const FINGERPRINT_HEX_CHARS: usize = 12;

/// An opaque API token.
///
/// Debug output shows the fingerprint only. Use `preview()` for log lines and
/// `expose()` only when stamping the token onto an outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    /// Leading characters of the token followed by `...`.
    ///
    /// Never shows more than half of the token, so short tokens are not
    /// printed in full.
    pub fn preview(&self) -> String {
        let token = self.expose();
        let shown = PREVIEW_CHARS.min(token.chars().count() / 2);
        let prefix: String = token.chars().take(shown).collect();
        format!("{prefix}...")
    }

    /// Stable short identifier derived from the token's SHA-256 digest.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.expose().as_bytes());
        hex::encode(&digest[..FINGERPRINT_HEX_CHARS / 2])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

/// Parse a comma-separated token list.
///
/// Entries are trimmed and empty entries dropped. Duplicates are kept; they
/// probe identically and are harmless. An empty result is a configuration
/// error.
pub fn parse_credentials(raw: &str) -> Result<Vec<Credential>> {
    let credentials: Vec<Credential> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Credential::new)
        .collect();

    if credentials.is_empty() {
        return Err(Error::Config("no tokens found in credential list".into()));
    }
    Ok(credentials)
}
