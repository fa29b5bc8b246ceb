//! Workspace state locking.
//!
//! Prevents two `cirrus` processes from mutating the same workspace at
//! once. Locks carry an expiry so a crashed process cannot wedge the
//! workspace forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// Information about a workspace lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock held by `holder`.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Returns true if the lock has expired and may be broken.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Builds a holder identifier for the current process from hostname, PID
/// and a random suffix.
#[must_use]
pub fn default_holder() -> String {
    let host = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().into_owned());
    let pid = std::process::id();
    let suffix = &Uuid::new_v4().to_string()[..8];

    format!("{host}-{pid}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_lock_is_not_expired() {
        let lock = LockInfo::new("holder-a");
        assert_eq!(lock.holder, "holder-a");
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() > 0);
    }

    #[test]
    fn test_holders_are_unique_per_call() {
        let first = default_holder();
        let second = default_holder();
        assert_ne!(first, second);
        assert!(first.contains(&std::process::id().to_string()));
    }
}
