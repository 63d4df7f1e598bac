//! Per-page-load channel token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Random bytes per token (hex-encoded to twice as many characters).
const TOKEN_BYTES: usize = 16;

/// Distinguishes weak tokens generated within the same clock tick.
static WEAK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Secret scoping the private event namespace between engine and bridge.
///
/// `Debug` output is redacted; use [`as_str`](ChannelToken::as_str) to read it.
///
/// # Example
///
/// ```
/// use page_audio::ChannelToken;
///
/// let a = ChannelToken::generate();
/// let b = ChannelToken::generate();
/// assert_ne!(a, b);
/// assert_eq!(a.as_str().len(), 32);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChannelToken(String);

impl ChannelToken {
    /// Generates a fresh token from the OS random source.
    ///
    /// Falls back to a clock-seeded generator if the OS source fails. That
    /// token is guessable in principle, so the fallback is logged.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            tracing::warn!(error = %e, "OS random source unavailable, using weak token");
            weak_fill(&mut bytes);
        }
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Wraps a token received out of band. Blank strings are rejected.
    pub fn from_string(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelToken(..)")
    }
}

fn weak_fill(bytes: &mut [u8]) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    let count = WEAK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = nanos ^ count.rotate_left(32) ^ u64::from(std::process::id());
    StdRng::seed_from_u64(seed).fill_bytes(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_hex() {
        let token = ChannelToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_BYTES * 2);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_from_string_rejects_blank() {
        assert!(ChannelToken::from_string("   ").is_none());
        assert_eq!(
            ChannelToken::from_string(" abc ").unwrap().as_str(),
            "abc"
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = ChannelToken::from_string("secret").unwrap();
        assert!(!format!("{token:?}").contains("secret"));
    }

    #[test]
    fn test_weak_fill_differs_between_calls() {
        let mut a = [0u8; TOKEN_BYTES];
        let mut b = [0u8; TOKEN_BYTES];
        weak_fill(&mut a);
        weak_fill(&mut b);
        assert_ne!(a, b);
    }
}
