//! API key wrapper.
//!
//! Keys are held only in memory for the lifetime of a session. The
//! wrapper trims on construction, redacts itself in `Debug`, and zeroizes
//! its buffer on drop so a key never ends up in logs or lingering memory.

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum trimmed length for a key to be worth sending to the provider.
pub const MIN_KEY_LEN: usize = 10;

/// Local formatting problem with a user-supplied key. Never involves a
/// network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyFormatError {
    #[error("API key must be at least 10 characters.")]
    TooShort,
}

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    /// Trim and length-check a user-supplied key.
    pub fn parse(raw: &str) -> Result<Self, KeyFormatError> {
        let trimmed = raw.trim();
        if !is_plausible(trimmed) {
            return Err(KeyFormatError::TooShort);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap an operator-provided credential. Only emptiness is checked by
    /// the caller; operator keys are not held to the user-key length rule.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// The raw key, for building a provider request. Do not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

/// Whether a (possibly untrimmed) key passes the local length rule.
pub fn is_plausible(raw: &str) -> bool {
    raw.trim().chars().count() >= MIN_KEY_LEN
}
