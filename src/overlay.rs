//! Overlay replay triggers
//!
//! A creator can ask their overlay to replay a donation alert. The request is
//! kept as a one-shot entry that the overlay picks up on its next poll, and
//! that silently expires if nobody does.
//!
//! Entries live in process memory, which is only correct for a single
//! instance. Running several instances needs a shared TTL store instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// A pending replay request
#[derive(Debug, Clone, Serialize)]
pub struct ReplayTrigger {
    /// Donation to replay
    pub donation_id: String,
    /// When the replay was requested
    pub requested_at: DateTime<Utc>,
    #[serde(skip)]
    expires_at: Instant,
}

/// One-shot, short-lived replay requests keyed by creator username
pub struct ReplayRegistry {
    ttl: Duration,
    triggers: Mutex<HashMap<String, ReplayTrigger>>,
}

impl ReplayRegistry {
    /// Create a registry whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Request a replay, replacing any earlier pending request of the creator
    pub async fn trigger(&self, creator: &str, donation_id: &str) -> ReplayTrigger {
        self.trigger_at(creator, donation_id, Instant::now()).await
    }

    /// Take the pending request of a creator, if one is still live
    pub async fn take(&self, creator: &str) -> Option<ReplayTrigger> {
        self.take_at(creator, Instant::now()).await
    }

    async fn trigger_at(&self, creator: &str, donation_id: &str, now: Instant) -> ReplayTrigger {
        let trigger = ReplayTrigger {
            donation_id: donation_id.to_string(),
            requested_at: Utc::now(),
            expires_at: now + self.ttl,
        };

        let mut triggers = self.triggers.lock().await;
        triggers.retain(|_, t| t.expires_at > now);
        triggers.insert(creator.to_string(), trigger.clone());
        debug!("Replay trigger set: creator={}, donation={}", creator, donation_id);
        trigger
    }

    async fn take_at(&self, creator: &str, now: Instant) -> Option<ReplayTrigger> {
        let trigger = self.triggers.lock().await.remove(creator)?;
        (trigger.expires_at > now).then_some(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_taken_once() {
        let registry = ReplayRegistry::new(Duration::from_secs(30));
        registry.trigger("alice", "d1").await;

        assert_eq!(registry.take("alice").await.unwrap().donation_id, "d1");
        assert!(registry.take("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_trigger_expires() {
        let registry = ReplayRegistry::new(Duration::from_secs(30));
        let start = Instant::now();
        registry.trigger_at("alice", "d1", start).await;

        let later = start + Duration::from_secs(31);
        assert!(registry.take_at("alice", later).await.is_none());
    }

    #[tokio::test]
    async fn test_newer_trigger_replaces_older() {
        let registry = ReplayRegistry::new(Duration::from_secs(30));
        registry.trigger("alice", "d1").await;
        registry.trigger("alice", "d2").await;
        registry.trigger("bob", "d3").await;

        assert_eq!(registry.take("alice").await.unwrap().donation_id, "d2");
        assert_eq!(registry.take("bob").await.unwrap().donation_id, "d3");
    }
}
