//! Cooldown tracker: in-memory rate-limit windows keyed by
//! `(command, surface, actor, scope)`.
//!
//! Expiry is evaluated lazily on every read; [`CooldownTracker::sweep`] only
//! reclaims memory and is safe to run at any cadence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use switchboard_core::{CooldownKey, CooldownRecord, EngineError, SurfaceType};

/// Selects records for [`CooldownTracker::clear_matching`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownFilter {
    pub actor_id: Option<String>,
    pub command: Option<String>,
    pub surface: Option<SurfaceType>,
    pub scope_id: Option<String>,
}

impl CooldownFilter {
    pub fn actor(actor_id: impl Into<String>) -> Self {
        Self { actor_id: Some(actor_id.into()), ..Self::default() }
    }

    pub fn command(command: impl Into<String>, surface: SurfaceType) -> Self {
        Self { command: Some(command.into()), surface: Some(surface), ..Self::default() }
    }

    pub fn scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn matches(&self, record: &CooldownRecord) -> bool {
        self.actor_id.as_deref().map_or(true, |a| a == record.actor_id)
            && self.command.as_deref().map_or(true, |c| c == record.command)
            && self.surface.map_or(true, |s| s == record.surface)
            && self.scope_id.as_deref().map_or(true, |s| record.scope_id.as_deref() == Some(s))
    }
}

/// Shared handle to the cooldown table. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    records: Arc<Mutex<HashMap<CooldownKey, CooldownRecord>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The still-active record for `key`, if any.
    pub async fn check(&self, key: &CooldownKey) -> Option<CooldownRecord> {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &CooldownKey, now: DateTime<Utc>) -> Option<CooldownRecord> {
        let records = self.records.lock().await;
        records.get(key).filter(|r| r.is_active_at(now)).cloned()
    }

    /// Insert `record`, refusing to overwrite an active window.
    pub async fn start(&self, record: CooldownRecord) -> Result<(), EngineError> {
        self.start_at(record, Utc::now()).await
    }

    pub async fn start_at(&self, record: CooldownRecord, now: DateTime<Utc>) -> Result<(), EngineError> {
        let key = record.key();
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&key).filter(|r| r.is_active_at(now)) {
            return Err(EngineError::AlreadyActive(Box::new(existing.clone())));
        }
        debug!(command = %key.command, actor = %key.actor_id, expires_at = %record.expires_at, "Cooldown started");
        records.insert(key, record);
        Ok(())
    }

    /// Check and start under one lock.
    ///
    /// Returns the new record, or the still-active one that blocked it.
    pub async fn try_start(&self, key: CooldownKey, millis: u64) -> Result<CooldownRecord, CooldownRecord> {
        self.try_start_at(key, Utc::now(), millis).await
    }

    pub async fn try_start_at(
        &self,
        key: CooldownKey,
        now: DateTime<Utc>,
        millis: u64,
    ) -> Result<CooldownRecord, CooldownRecord> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&key).filter(|r| r.is_active_at(now)) {
            debug!(command = %key.command, actor = %key.actor_id, "Cooldown check: active");
            return Err(existing.clone());
        }
        let record = CooldownRecord::starting_at(key.clone(), now, millis);
        debug!(command = %key.command, actor = %key.actor_id, expires_at = %record.expires_at, "Cooldown started");
        records.insert(key, record.clone());
        Ok(record)
    }

    /// Remove the record for `key`, active or not.
    pub async fn clear(&self, key: &CooldownKey) -> Option<CooldownRecord> {
        self.records.lock().await.remove(key)
    }

    /// Remove every record matching `filter`. Returns how many were removed.
    pub async fn clear_matching(&self, filter: &CooldownFilter) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !filter.matches(record));
        before - records.len()
    }

    /// Drop expired records. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.is_active_at(now));
        before - records.len()
    }

    /// Stored records, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Run [`sweep`](Self::sweep) every `period` until the handle is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let tracker = self.clone();
        info!(period_secs = period.as_secs(), "Cooldown sweeper started");
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = tracker.sweep().await;
                debug!(removed, "Cooldown sweep");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn key(actor: &str) -> CooldownKey {
        CooldownKey::new("ping", SurfaceType::Text, actor, Some("g1".into()))
    }

    #[tokio::test]
    async fn check_returns_record_until_expiry() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        let record = CooldownRecord::starting_at(key("a"), now, 10_000);
        tracker.start_at(record.clone(), now).await.unwrap();

        assert_eq!(tracker.check_at(&key("a"), now).await, Some(record.clone()));
        assert_eq!(
            tracker.check_at(&key("a"), now + ChronoDuration::milliseconds(9_999)).await,
            Some(record)
        );
        // Expired without any sweep.
        assert_eq!(tracker.check_at(&key("a"), now + ChronoDuration::milliseconds(10_000)).await, None);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn start_refuses_active_window() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        let first = CooldownRecord::starting_at(key("a"), now, 5_000);
        tracker.start_at(first.clone(), now).await.unwrap();

        let second = CooldownRecord::starting_at(key("a"), now, 8_000);
        match tracker.start_at(second.clone(), now).await {
            Err(EngineError::AlreadyActive(existing)) => assert_eq!(*existing, first),
            other => panic!("unexpected {:?}", other),
        }

        // Allowed once the first window has passed.
        let later = now + ChronoDuration::seconds(6);
        tracker.start_at(CooldownRecord::starting_at(key("a"), later, 8_000), later).await.unwrap();
    }

    #[tokio::test]
    async fn try_start_is_exclusive() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        let started = tracker.try_start_at(key("a"), now, 10_000).await.unwrap();
        let blocked = tracker.try_start_at(key("a"), now, 10_000).await.unwrap_err();
        assert_eq!(started, blocked);
        assert!(tracker.try_start_at(key("b"), now, 10_000).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_try_start_admits_once() {
        let tracker = CooldownTracker::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move { tracker.try_start(key("a"), 60_000).await.is_ok() }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn tuples_are_independent() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.try_start_at(key("a"), now, 10_000).await.unwrap();
        let other_scope = CooldownKey::new("ping", SurfaceType::Text, "a", Some("g2".into()));
        let other_surface = CooldownKey::new("ping", SurfaceType::Structured, "a", Some("g1".into()));
        assert!(tracker.check_at(&other_scope, now).await.is_none());
        assert!(tracker.check_at(&other_surface, now).await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.try_start_at(key("a"), now, 1_000).await.unwrap();
        tracker.try_start_at(key("b"), now, 60_000).await.unwrap();
        assert_eq!(tracker.sweep_at(now + ChronoDuration::seconds(2)).await, 1);
        assert_eq!(tracker.len().await, 1);
        assert!(tracker.check_at(&key("b"), now).await.is_some());
    }

    #[tokio::test]
    async fn clear_matching_by_actor() {
        let tracker = CooldownTracker::new();
        let now = Utc::now();
        tracker.try_start_at(key("a"), now, 10_000).await.unwrap();
        tracker
            .try_start_at(CooldownKey::new("echo", SurfaceType::Text, "a", None), now, 10_000)
            .await
            .unwrap();
        tracker.try_start_at(key("b"), now, 10_000).await.unwrap();

        assert_eq!(tracker.clear_matching(&CooldownFilter::actor("a")).await, 2);
        assert!(tracker.clear(&key("b")).await.is_some());
        assert!(tracker.is_empty().await);
    }

    #[test]
    fn filter_matches_scope() {
        let record = CooldownRecord::starting_at(key("a"), Utc::now(), 1);
        assert!(CooldownFilter::command("ping", SurfaceType::Text).scope("g1").matches(&record));
        assert!(!CooldownFilter::command("ping", SurfaceType::Text).scope("g2").matches(&record));
        assert!(!CooldownFilter::command("ping", SurfaceType::Context).matches(&record));
    }
}
