use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::time::Clock;

const SUFFIX_LEN: usize = 9;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Per-tab session identifier, `{epoch_millis}-{random suffix}`.
///
/// Unrelated to backend authentication; it only marks that a client instance
/// has been registered.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a previously stored identifier.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generates a fresh identifier using the thread-local RNG.
    #[must_use]
    pub fn generate(clock: &Clock) -> Self {
        Self::generate_with(clock, &mut rand::rng())
    }

    /// Generates a fresh identifier with a caller-provided RNG.
    #[must_use]
    pub fn generate_with<R: Rng + ?Sized>(clock: &Clock, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())]))
            .collect();
        Self(format!("{}-{suffix}", clock.unix_millis()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
