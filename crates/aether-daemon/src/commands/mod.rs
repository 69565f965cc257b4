//! JSON-RPC command handlers.
//!
//! Each submodule implements the commands for one method family. Handlers
//! lock the ledger for the whole call and publish every event the call
//! recorded, including events of a call that then failed.

pub mod access;
pub mod events;
pub mod lootbox;
pub mod params;
pub mod registry;

use serde::Serialize;
use serde_json::Value;

use crate::ledger::Ledger;
use crate::rpc::RpcError;
use crate::DaemonState;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Publish everything `ledger` recorded since the last drain.
pub(crate) fn publish(state: &DaemonState, ledger: &mut Ledger) {
    let events = ledger.drain_events();
    if !events.is_empty() {
        let sequence = state.event_bus.publish(events);
        tracing::trace!(sequence, "daemon: events published");
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&format!("encoding: {e}")))
}
