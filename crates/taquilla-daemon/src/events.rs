//! Event emission.
//!
//! Events are pushed to clients that called `subscribe_events` as JSON-RPC
//! notifications. Each subscriber has an independent buffer; a subscriber
//! that falls more than the capacity behind skips the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "WithdrawalCreated", "DaemonStarted").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

impl Event {
    /// An event stamped with the current time.
    pub fn now(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: u64::try_from(Utc::now().timestamp()).unwrap_or_default(),
            payload,
        }
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "ledger", "sync", "keys", "system".
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Only ledger events touching these pots.
    #[serde(default)]
    pub pots: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let category = categorize_event(&event.event_type);
            if !categories.iter().any(|c| c == category) {
                return false;
            }
        }

        if let Some(ref pots) = self.pots {
            if let Some(pot) = event.payload.get("pot").and_then(|v| v.as_str()) {
                if !pots.iter().any(|p| p == pot) {
                    return false;
                }
            }
        }

        true
    }
}

fn categorize_event(event_type: &str) -> &'static str {
    match event_type {
        s if s.starts_with("Withdrawal") || s.starts_with("Pot") => "ledger",
        s if s.starts_with("OfflineQueue") => "sync",
        s if s.starts_with("ApiKey") => "keys",
        _ => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event::now("DaemonStarted", json!({"version": "0.1.0"})));

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert!(event.timestamp > 0);
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(Event::now("DaemonStarted", json!({})));
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_event_filter_categories() {
        let filter = EventFilter {
            categories: Some(vec!["ledger".to_string()]),
            pots: None,
        };
        assert!(filter.matches(&Event::now("WithdrawalCreated", json!({}))));
        assert!(!filter.matches(&Event::now("OfflineQueueDrained", json!({}))));
    }

    #[test]
    fn test_event_filter_pots() {
        let filter = EventFilter {
            categories: None,
            pots: Some(vec!["Caja".to_string()]),
        };
        assert!(filter.matches(&Event::now("WithdrawalCreated", json!({"pot": "Caja"}))));
        assert!(!filter.matches(&Event::now("WithdrawalCreated", json!({"pot": "Premios"}))));
        // Events without a pot pass.
        assert!(filter.matches(&Event::now("DaemonStarted", json!({}))));
    }

    #[test]
    fn test_categorize_event() {
        assert_eq!(categorize_event("WithdrawalCreated"), "ledger");
        assert_eq!(categorize_event("WithdrawalRecordedLocally"), "ledger");
        assert_eq!(categorize_event("PotUpdated"), "ledger");
        assert_eq!(categorize_event("OfflineQueueDrained"), "sync");
        assert_eq!(categorize_event("ApiKeyRevoked"), "keys");
        assert_eq!(categorize_event("DaemonStarted"), "system");
    }

    #[test]
    fn test_event_stamped_with_wall_clock_seconds() {
        let before = Utc::now().timestamp();
        let event = Event::now("DaemonStarted", json!({}));
        let after = Utc::now().timestamp();
        let stamped = i64::try_from(event.timestamp).expect("fits");
        assert!((before..=after).contains(&stamped));
    }
}
