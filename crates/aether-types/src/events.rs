//! Ledger event envelope.
//!
//! Confidential operations emit exactly one result event and one
//! `ObliviousError` event per call; plaintext administrative and ticket
//! operations emit one event on success. Payloads carry ciphertext handles
//! (hex) for confidential fields and plain values for everything else.

use serde::{Deserialize, Serialize};

use crate::Address;

/// Envelope for all ledger events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// The contract (collection or loot box) that emitted the event.
    pub contract: Address,
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Confidential registry events
    ObliviousTransfer,
    BalanceResult,
    OwnerResult,
    ObliviousApprovalForAll,
    ObliviousError,

    // Loot box events
    TierAdded,
    BlueprintAdded,
    TicketPurchased,
    TicketPopped,
    TicketRefunded,
    LootResolved,
}

impl EventType {
    /// Whether the payload of this event carries ciphertext handles.
    pub fn is_confidential(&self) -> bool {
        matches!(
            self,
            EventType::ObliviousTransfer
                | EventType::BalanceResult
                | EventType::OwnerResult
                | EventType::ObliviousApprovalForAll
                | EventType::ObliviousError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_snake_case() {
        let json = serde_json::to_string(&EventType::ObliviousApprovalForAll).expect("serialize");
        assert_eq!(json, "\"oblivious_approval_for_all\"");
    }

    #[test]
    fn test_confidential_classification() {
        assert!(EventType::ObliviousError.is_confidential());
        assert!(EventType::BalanceResult.is_confidential());
        assert!(!EventType::TicketPurchased.is_confidential());
        assert!(!EventType::LootResolved.is_confidential());
    }
}
