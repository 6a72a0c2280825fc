//! Lock record stored next to the state while a run modifies it

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// How long a lock is honoured before another run may take it over
pub const LOCK_TTL_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// Command holding the lock ("apply", "destroy", "import", "state rm")
    pub operation: String,
    /// `user@host` of the holder
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// Version of the tool that took the lock
    #[serde(default)]
    pub tool_version: String,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_timeout(operation, LOCK_TTL_SECS)
    }

    pub fn with_timeout(operation: impl Into<String>, ttl_secs: i64) -> Self {
        let created = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: holder(),
            created,
            expires: created + TimeDelta::seconds(ttl_secs),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires < Utc::now()
    }

    pub fn time_remaining(&self) -> TimeDelta {
        self.expires - Utc::now()
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} by {}, expires {})",
            self.id,
            self.operation,
            self.who,
            self.expires.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

fn holder() -> String {
    let user = ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{user}@{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lock_is_held_by_this_process() {
        let lock = LockInfo::new("apply");
        assert_eq!(lock.operation, "apply");
        assert!(lock.who.contains('@'));
        assert_eq!(lock.tool_version, env!("CARGO_PKG_VERSION"));
        assert!(!lock.is_expired());

        let remaining = lock.time_remaining().num_seconds();
        assert!(remaining > LOCK_TTL_SECS - 5 && remaining <= LOCK_TTL_SECS);
    }

    #[test]
    fn negative_ttl_is_already_expired() {
        assert!(LockInfo::with_timeout("destroy", -1).is_expired());
    }

    #[test]
    fn reads_locks_without_tool_version() {
        let json = r#"{
            "id": "abc",
            "operation": "import",
            "who": "ops@bastion",
            "created": "2026-01-01T00:00:00Z",
            "expires": "2026-01-01T00:15:00Z"
        }"#;
        let lock: LockInfo = serde_json::from_str(json).unwrap();
        assert!(lock.is_expired());
        assert_eq!(lock.tool_version, "");
        assert_eq!(
            lock.to_string(),
            "abc (import by ops@bastion, expires 2026-01-01 00:15:00 UTC)"
        );
    }
}
