//! Event subscription handlers.

use serde_json::Value;
use tokio::sync::broadcast;

use super::Result;
use crate::events::{EventFilter, SequencedEvent};
use crate::rpc::{RpcError, Session};
use crate::DaemonState;

/// A connection's live subscription.
pub struct Subscription {
    pub id: String,
    pub filter: EventFilter,
    pub receiver: broadcast::Receiver<SequencedEvent>,
}

/// Start streaming events to this connection, replacing any previous
/// subscription.
///
/// Returns the sequence of the last event already published; the first
/// notification carries a higher sequence.
pub fn subscribe_events(state: &DaemonState, params: &Value, session: &mut Session) -> Result {
    let filter: EventFilter = match params.get("filter") {
        None | Some(Value::Null) => EventFilter::default(),
        Some(filter) => serde_json::from_value(filter.clone())
            .map_err(|e| RpcError::invalid_params(&format!("filter: {e}")))?,
    };

    let receiver = state.event_bus.subscribe();
    let sequence = state.event_bus.sequence();

    let mut sub_id = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut sub_id);
    let id = hex::encode(sub_id);

    session.subscription = Some(Subscription {
        id: id.clone(),
        filter,
        receiver,
    });
    Ok(serde_json::json!({
        "subscription_id": id,
        "sequence": sequence,
    }))
}

pub fn unsubscribe_events(session: &mut Session) -> Result {
    let removed = session.subscription.take();
    Ok(serde_json::json!({
        "unsubscribed": removed.is_some(),
        "subscription_id": removed.map(|s| s.id),
    }))
}
