use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Timing constants and identity/version generation for the lock client.
///
/// All four generator methods (`new_owner`, `new_version`, `now_ms`,
/// `is_name_valid`) are overridable so tests can inject deterministic clocks
/// and identifiers without touching the protocol engine itself.
pub trait Policy: fmt::Debug + Send + Sync {
    /// Maximum wall time a single `acquire` call may spend before giving up.
    fn acquire_timeout(&self) -> Duration;

    /// Sleep between contention polls inside `acquire`.
    fn retry_period(&self) -> Duration;

    /// Default lease length stamped into newly acquired locks.
    fn lock_duration(&self) -> Duration;

    /// Default release mode: delete the record vs. mark `is_locked = false`.
    fn delete_lock(&self) -> bool;

    /// Cadence of the background heartbeat worker.
    fn heartbeat_period(&self) -> Duration;

    /// A fresh owner id, unique to this client instance.
    fn new_owner(&self) -> String;

    /// A fresh version token. Must have negligible collision probability;
    /// monotonic counters are not acceptable since the takeover branch
    /// compares versions for equality across independent clients.
    fn new_version(&self) -> String;

    /// The current wall-clock time in milliseconds since the epoch, as seen
    /// by this client.
    fn now_ms(&self) -> i64;

    /// Whether `name` is an acceptable lock name.
    fn is_name_valid(&self, name: &str) -> bool;
}

/// The default [`Policy`]: random UUIDv4 owners/versions, `SystemTime`-backed
/// clock, and non-empty name validation.
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    acquire_timeout: Duration,
    retry_period: Duration,
    lock_duration: Duration,
    delete_lock: bool,
    heartbeat_period: Duration,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(10_000),
            retry_period: Duration::from_secs(10),
            lock_duration: Duration::from_millis(60_000),
            delete_lock: true,
            heartbeat_period: Duration::from_secs(10),
        }
    }
}

impl DefaultPolicy {
    pub(crate) fn with_acquire_timeout(mut self, d: Duration) -> Self {
        self.acquire_timeout = d;
        self
    }

    pub(crate) fn with_retry_period(mut self, d: Duration) -> Self {
        self.retry_period = d;
        self
    }

    pub(crate) fn with_lock_duration(mut self, d: Duration) -> Self {
        self.lock_duration = d;
        self
    }

    pub(crate) fn with_delete_lock(mut self, delete: bool) -> Self {
        self.delete_lock = delete;
        self
    }

    pub(crate) fn with_heartbeat_period(mut self, d: Duration) -> Self {
        self.heartbeat_period = d;
        self
    }
}

impl Policy for DefaultPolicy {
    fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    fn retry_period(&self) -> Duration {
        self.retry_period
    }

    fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    fn delete_lock(&self) -> bool {
        self.delete_lock
    }

    fn heartbeat_period(&self) -> Duration {
        self.heartbeat_period
    }

    fn new_owner(&self) -> String {
        let host = hostname();
        format!("{host}.{}", Uuid::new_v4())
    }

    fn new_version(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn now_ms(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        now.as_millis() as i64
    }

    fn is_name_valid(&self, name: &str) -> bool {
        !name.is_empty()
    }
}

/// Converts a [`Duration`] to whole milliseconds, the unit every timing
/// field in a [`crate::Lock`] is expressed in.
pub(crate) fn millis(d: Duration) -> i64 {
    d.as_millis() as i64
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_rejects_empty_names() {
        let policy = DefaultPolicy::default();
        assert!(!policy.is_name_valid(""));
        assert!(policy.is_name_valid("job"));
    }

    #[test]
    fn new_version_is_not_monotonic_but_unique() {
        let policy = DefaultPolicy::default();
        let a = policy.new_version();
        let b = policy.new_version();
        assert_ne!(a, b);
    }
}
