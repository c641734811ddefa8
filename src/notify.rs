//! Paid-donation notifications
//!
//! Events are broadcast to in-process subscribers and relayed best-effort
//! to the external socket service (`POST <relay>/notify`). The relay call is
//! fire-and-forget: failures are logged and dropped, nothing is retried.

use crate::config::RelayConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the in-process broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// A donation that just became PAID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationEvent {
    /// Donation ID
    pub donation_id: String,
    /// Receiving creator
    pub creator_username: String,
    /// Donor name
    pub name: String,
    /// Amount
    pub amount: i64,
    /// Donor message
    pub message: String,
    /// Donation creation time
    pub created_at: DateTime<Utc>,
}

/// Body sent to the socket relay
#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    name: &'a str,
    amount: i64,
    message: &'a str,
    #[serde(rename = "createdAt")]
    created_at: String,
}

impl<'a> From<&'a DonationEvent> for RelayPayload<'a> {
    fn from(event: &'a DonationEvent) -> Self {
        Self {
            name: &event.name,
            amount: event.amount,
            message: &event.message,
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

/// HTTP client for the socket relay
#[derive(Debug, Clone)]
struct RelayClient {
    client: reqwest::Client,
    notify_url: String,
    timeout: Duration,
}

impl RelayClient {
    fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            notify_url: format!("{}/notify", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    async fn notify(&self, event: &DonationEvent) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.notify_url)
            .timeout(self.timeout)
            .json(&RelayPayload::from(event))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("relay returned {}", response.status()));
        }
        Ok(())
    }
}

/// Fan-out point for paid-donation events
pub struct NotificationHub {
    broadcast_tx: broadcast::Sender<DonationEvent>,
    relay: Option<RelayClient>,
}

impl NotificationHub {
    /// Create a hub; the relay is only used when a URL is configured
    pub fn new(config: &RelayConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let relay = config
            .url
            .as_deref()
            .map(|url| RelayClient::new(url, Duration::from_secs(config.timeout_seconds)));

        Self { broadcast_tx, relay }
    }

    /// Subscribe to paid-donation events
    pub fn subscribe(&self) -> broadcast::Receiver<DonationEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Publish an event. Never blocks on, or fails because of, the relay.
    pub fn publish(&self, event: DonationEvent) {
        info!(
            "Notify: donation {} for {} ({} from {})",
            event.donation_id, event.creator_username, event.amount, event.name
        );

        if let Some(relay) = self.relay.clone() {
            let relayed = event.clone();
            tokio::spawn(async move {
                match relay.notify(&relayed).await {
                    Ok(()) => debug!("Relay accepted notification for {}", relayed.donation_id),
                    Err(e) => warn!(
                        "Relay notification for {} dropped: {}",
                        relayed.donation_id, e
                    ),
                }
            });
        }

        if self.broadcast_tx.send(event).is_err() {
            debug!("No in-process subscribers for donation event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DonationEvent {
        DonationEvent {
            donation_id: "d1".to_string(),
            creator_username: "alice".to_string(),
            name: "Budi".to_string(),
            amount: 50_000,
            message: "semangat!".to_string(),
            created_at: "2026-03-01T10:00:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = NotificationHub::new(&RelayConfig::default());
        let mut rx = hub.subscribe();

        hub.publish(event());

        assert_eq!(rx.recv().await.unwrap(), event());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_swallowed() {
        let config = RelayConfig {
            url: Some("http://127.0.0.1:9".to_string()),
            timeout_seconds: 1,
        };
        let hub = NotificationHub::new(&config);
        let mut rx = hub.subscribe();

        hub.publish(event());

        assert_eq!(rx.recv().await.unwrap().donation_id, "d1");
    }

    #[test]
    fn test_relay_payload_shape() {
        let event = event();
        let json = serde_json::to_value(RelayPayload::from(&event)).unwrap();
        assert_eq!(json["name"], "Budi");
        assert_eq!(json["amount"], 50_000);
        assert_eq!(json["message"], "semangat!");
        assert_eq!(json["createdAt"], "2026-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_notify_url_trims_slash() {
        let relay = RelayClient::new("http://relay:3001/", Duration::from_secs(1));
        assert_eq!(relay.notify_url, "http://relay:3001/notify");
    }
}
