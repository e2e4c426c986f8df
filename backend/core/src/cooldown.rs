//! Cooldown record types shared by the tracker, the halt events and observers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SurfaceType;

/// Admission tuple a cooldown is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CooldownKey {
    pub command: String,
    pub surface: SurfaceType,
    pub actor_id: String,
    /// Channel or guild the cooldown is bound to; `None` means everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
}

impl CooldownKey {
    pub fn new(
        command: impl Into<String>,
        surface: SurfaceType,
        actor_id: impl Into<String>,
        scope_id: Option<String>,
    ) -> Self {
        Self { command: command.into(), surface, actor_id: actor_id.into(), scope_id }
    }
}

/// An active rate-limit window. Never mutated, only removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub command: String,
    pub surface: SurfaceType,
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CooldownRecord {
    pub fn new(key: CooldownKey, expires_at: DateTime<Utc>) -> Self {
        Self {
            command: key.command,
            surface: key.surface,
            actor_id: key.actor_id,
            scope_id: key.scope_id,
            expires_at,
        }
    }

    /// Record for `key` expiring `millis` after `now`.
    pub fn starting_at(key: CooldownKey, now: DateTime<Utc>, millis: u64) -> Self {
        let millis = i64::try_from(millis).unwrap_or(i64::MAX);
        let expires_at = now
            .checked_add_signed(Duration::milliseconds(millis))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(key, expires_at)
    }

    pub fn key(&self) -> CooldownKey {
        CooldownKey {
            command: self.command.clone(),
            surface: self.surface,
            actor_id: self.actor_id.clone(),
            scope_id: self.scope_id.clone(),
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Time left before the window closes, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_expiry() {
        let now = Utc::now();
        let key = CooldownKey::new("ping", SurfaceType::Text, "a", None);
        let record = CooldownRecord::starting_at(key.clone(), now, 10_000);
        assert_eq!(record.key(), key);
        assert!(record.is_active_at(now));
        assert!(record.is_active_at(now + Duration::milliseconds(9_999)));
        assert!(!record.is_active_at(now + Duration::milliseconds(10_000)));
        assert_eq!(record.remaining_at(now + Duration::seconds(20)), Duration::zero());
    }
}
