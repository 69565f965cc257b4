//! Event publication.
//!
//! Every ledger event is stamped with a daemon-wide sequence number and
//! broadcast to subscribed connections. Each subscriber has an independent
//! buffer; a subscriber that falls behind loses the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aether_types::events::{Event, EventType};
use aether_types::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A ledger event with its publication sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// 1-based, strictly increasing across the daemon's lifetime.
    pub sequence: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events emitted by these contracts.
    #[serde(default)]
    pub contracts: Option<Vec<Address>>,
    /// Only these event types.
    #[serde(default)]
    pub event_types: Option<Vec<EventType>>,
    /// Only events carrying ciphertext handles (`true`) or only plaintext
    /// events (`false`).
    #[serde(default)]
    pub confidential: Option<bool>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SequencedEvent>,
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

    /// Publish events in order. Returns the sequence of the last one.
    pub fn publish(&self, events: Vec<Event>) -> u64 {
        let mut last = self.sequence();
        for event in events {
            last = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            // Ignore send errors (no subscribers)
            let _ = self.sender.send(SequencedEvent {
                sequence: last,
                event,
            });
        }
        last
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.sender.subscribe()
    }

    /// Sequence number of the most recently published event.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref contracts) = self.contracts {
            if !contracts.contains(&event.contract) {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(confidential) = self.confidential {
            if event.event_type.is_confidential() != confidential {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(contract: Address, event_type: EventType) -> Event {
        Event {
            contract,
            event_type,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let last = bus.publish(vec![
            event(Address([1; 20]), EventType::ObliviousTransfer),
            event(Address([1; 20]), EventType::ObliviousError),
        ]);
        assert_eq!(last, 2);
        assert_eq!(bus.sequence(), 2);

        let first = rx.try_recv().expect("first event");
        let second = rx.try_recv().expect("second event");
        assert_eq!(first.sequence, 1);
        assert_eq!(first.event.event_type, EventType::ObliviousTransfer);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.event.event_type, EventType::ObliviousError);
    }

    #[test]
    fn test_publish_nothing_keeps_sequence() {
        let bus = EventBus::new(4);
        bus.publish(vec![event(Address::ZERO, EventType::TierAdded)]);
        assert_eq!(bus.publish(Vec::new()), 1);
    }

    #[test]
    fn test_event_filter() {
        let collection = Address([1; 20]);
        let lootbox = Address([2; 20]);

        let by_contract = EventFilter {
            contracts: Some(vec![lootbox]),
            ..EventFilter::default()
        };
        assert!(by_contract.matches(&event(lootbox, EventType::TicketPurchased)));
        assert!(!by_contract.matches(&event(collection, EventType::ObliviousTransfer)));

        let confidential_only = EventFilter {
            confidential: Some(true),
            ..EventFilter::default()
        };
        assert!(confidential_only.matches(&event(collection, EventType::ObliviousError)));
        assert!(!confidential_only.matches(&event(lootbox, EventType::TierAdded)));

        let by_type = EventFilter {
            event_types: Some(vec![EventType::LootResolved]),
            ..EventFilter::default()
        };
        assert!(by_type.matches(&event(lootbox, EventType::LootResolved)));
        assert!(!by_type.matches(&event(lootbox, EventType::TicketPopped)));
    }

    #[test]
    fn test_sequenced_event_flattens() {
        let json = serde_json::to_value(SequencedEvent {
            sequence: 9,
            event: event(Address::ZERO, EventType::TicketRefunded),
        })
        .expect("serialize");
        assert_eq!(json["sequence"], 9);
        assert_eq!(json["event_type"], "ticket_refunded");
    }
}
