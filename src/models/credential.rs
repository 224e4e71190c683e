//! Request-scoped push credential
//!
//! A `Credential` is moved into exactly one publish call and dropped when that
//! call returns. It cannot be cloned, serialized or formatted: `Debug` prints a
//! redaction marker and there is no `Display`.

use std::fmt;

pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap a bearer token. Returns `None` for an empty or whitespace-only token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return None;
        }
        Some(Self { token })
    }

    /// Read the token from an environment variable for this run only
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    pub(crate) fn secret(&self) -> &str {
        &self.token
    }

    /// Replace any occurrence of the token in `text` before it leaves the publisher
    pub(crate) fn redact(&self, text: &str) -> String {
        text.replace(&self.token, "[REDACTED]")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        // best-effort wipe of the heap buffer
        let mut bytes = std::mem::take(&mut self.token).into_bytes();
        bytes.iter_mut().for_each(|b| *b = 0);
    }
}
