use serde::{Deserialize, Serialize};

/// Default number of commit attempts per interaction.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

/// Retry budget for conflicting interaction commits.
///
/// Every failed attempt means some other commit on the same profile landed
/// in between, so a caller racing `n` others fails at most `n` times.
/// `max_attempts` bounds how much such contention a single call absorbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// A policy with the given budget. Zero is raised to one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Exactly one attempt; any conflict surfaces as contention.
    pub fn no_retry() -> Self {
        Self::new(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
