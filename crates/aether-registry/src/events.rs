//! Typed result records.
//!
//! Every confidential operation returns a [`Receipt`] holding its result
//! record and its encrypted error mask. The same two records are appended to
//! the collection's [`EventLog`] as one result event and one
//! `ObliviousError` event.

use aether_fhe::{Eaddress, Ebool, Euint256, Euint64};
use aether_types::events::{Event, EventType};
use aether_types::Address;
use serde::{Deserialize, Serialize};

use crate::error_channel::ObliviousError;
use crate::{RegistryError, Result};

/// A result record that can be published as an event.
pub trait ResultEvent: Serialize {
    const EVENT_TYPE: EventType;
}

/// Encrypted `(from, to, asset_id)` of a mint or transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObliviousTransfer {
    pub from: Eaddress,
    pub to: Eaddress,
    pub asset_id: Euint256,
}

impl ResultEvent for ObliviousTransfer {
    const EVENT_TYPE: EventType = EventType::ObliviousTransfer;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub balance: Euint64,
}

impl ResultEvent for BalanceResult {
    const EVENT_TYPE: EventType = EventType::BalanceResult;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerResult {
    pub owner: Eaddress,
}

impl ResultEvent for OwnerResult {
    const EVENT_TYPE: EventType = EventType::OwnerResult;
}

/// Approval record. The operator is a plaintext call argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObliviousApprovalForAll {
    pub owner: Eaddress,
    pub operator: Address,
    pub approved: Ebool,
}

impl ResultEvent for ObliviousApprovalForAll {
    const EVENT_TYPE: EventType = EventType::ObliviousApprovalForAll;
}

/// The outcome of a confidential call.
///
/// `result` is only meaningful when `error.mask` decrypts to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt<E> {
    pub result: E,
    pub error: ObliviousError,
}

impl<E: ResultEvent> Receipt<E> {
    /// The result event followed by the error-mask event.
    pub fn to_events(&self, contract: Address) -> Result<[Event; 2]> {
        Ok([
            Event {
                contract,
                event_type: E::EVENT_TYPE,
                payload: to_payload(&self.result)?,
            },
            Event {
                contract,
                event_type: EventType::ObliviousError,
                payload: to_payload(&self.error)?,
            },
        ])
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| RegistryError::EventEncoding(e.to_string()))
}

/// Append-only in-memory event log of one contract.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Record both events of a receipt.
    pub fn record<E: ResultEvent>(&mut self, contract: Address, receipt: &Receipt<E>) -> Result<()> {
        self.events.extend(receipt.to_events(contract)?);
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every event recorded so far.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_fhe::{Encrypted, FheType, Handle};

    fn handle(byte: u8, ty: FheType) -> Handle {
        Handle::from_digest(&[byte; 32], ty)
    }

    #[test]
    fn test_receipt_emits_result_then_error() {
        let receipt = Receipt {
            result: BalanceResult {
                balance: Euint64::from_handle_unchecked(handle(1, FheType::Uint64)),
            },
            error: ObliviousError {
                mask: aether_fhe::Euint8::from_handle_unchecked(handle(2, FheType::Uint8)),
            },
        };
        let contract = Address([0xC0; 20]);
        let mut log = EventLog::new();
        log.record(contract, &receipt).expect("record");

        let events = log.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::BalanceResult);
        assert_eq!(events[1].event_type, EventType::ObliviousError);
        assert_eq!(events[0].contract, contract);
        assert_eq!(
            events[0].payload["balance"],
            serde_json::to_value(handle(1, FheType::Uint64)).expect("json")
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_approval_payload_keeps_operator_plaintext() {
        let record = ObliviousApprovalForAll {
            owner: Eaddress::from_handle_unchecked(handle(3, FheType::Address)),
            operator: Address([0xEE; 20]),
            approved: Ebool::from_handle_unchecked(handle(4, FheType::Bool)),
        };
        let payload = serde_json::to_value(record).expect("json");
        assert_eq!(payload["operator"], serde_json::json!(hex::encode([0xEE; 20])));
    }
}
