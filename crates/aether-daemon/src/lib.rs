//! # aether-daemon
//!
//! Serves one confidential collection and one loot box over JSON-RPC on a
//! Unix socket. All ledger calls are serialized through a single mutex, so
//! each call observes every effect of the calls completed before it.
//!
//! ## Modules
//!
//! - [`config`] — `config.toml` loading
//! - [`ledger`] — The provider, collection and loot box being served
//! - [`events`] — Sequenced event bus and subscription filters
//! - [`rpc`] — JSON-RPC framing, dispatch and error codes
//! - [`commands`] — Method handlers

pub mod commands;
pub mod config;
pub mod events;
pub mod ledger;
pub mod rpc;

use tokio::sync::Mutex;

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::ledger::Ledger;

/// Event bus buffer per subscriber.
pub const EVENT_BUFFER: usize = 1000;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// The ledger. Held for the whole duration of every call.
    pub ledger: Mutex<Ledger>,
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
}

impl DaemonState {
    pub fn new(config: DaemonConfig) -> anyhow::Result<Self> {
        let mut ledger = Ledger::from_config(&config)?;
        let event_bus = EventBus::new(EVENT_BUFFER);
        // Bootstrap events take the first sequence numbers.
        event_bus.publish(ledger.drain_events());
        Ok(Self {
            ledger: Mutex::new(ledger),
            config,
            event_bus,
        })
    }
}
