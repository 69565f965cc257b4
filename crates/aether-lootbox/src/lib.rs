//! # aether-lootbox
//!
//! Randomized allocation over a confidential collection.
//!
//! Tier and blueprint configuration, ticket queues, and selection are
//! plaintext and fail fast: every error is returned before any state is
//! mutated, with one deliberate exception. A loot that lands on an exhausted
//! blueprint consumes the ticket without refund. Successful resolution mints
//! the allocation record through the confidential registry, so ownership of
//! looted items is as private as any other asset.
//!
//! ## Modules
//!
//! - [`tiers`] — Tier and blueprint registry with capacity ceilings
//! - [`tickets`] — Ticket purchase and per-buyer FIFO queues
//! - [`resolution`] — Seed rolls, weighted selection, and `loot`

pub mod resolution;
pub mod tickets;
pub mod tiers;

use aether_registry::{ConfidentialCollection, EventLog, RegistryError};
use aether_types::events::{Event, EventType};
use aether_types::Address;
use rand::RngCore;
use serde::Serialize;

pub use resolution::{select_blueprint, select_tier, LootOutcome};
pub use tickets::{Purchase, Ticket, TicketLedger};
pub use tiers::{Blueprint, Tier, TierAllocationRegistry, TierMask};

/// Default ticket price in base currency units.
pub const DEFAULT_TICKET_PRICE: u128 = 100_000_000_000;

/// Error types for loot box operations.
#[derive(Debug, thiserror::Error)]
pub enum LootError {
    /// The caller is not the configured administrator.
    #[error("{0} is not the loot box administrator")]
    Unauthorized(Address),

    /// A tier with the same name, weight, or mask exists.
    #[error("duplicate tier: {0}")]
    DuplicateTier(String),

    /// Tier weight must be nonzero.
    #[error("tier weight must be nonzero")]
    InvalidWeight,

    /// Tier mask must have exactly one bit set.
    #[error("tier mask {0:#x} is not a single bit")]
    InvalidMask(TierMask),

    #[error("unknown tier {0}")]
    UnknownTier(u64),

    #[error("blueprint {name} already exists in tier {tier}")]
    DuplicateBlueprint { tier: u64, name: String },

    #[error("unknown blueprint {index} in tier {tier}")]
    UnknownBlueprint { tier: u64, index: usize },

    /// Blueprint max supply must be nonzero.
    #[error("blueprint max supply must be nonzero")]
    InvalidSupply,

    /// A configuration ceiling would be exceeded.
    #[error("capacity overflow: {0}")]
    CapacityOverflow(String),

    #[error("insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment { required: u128, offered: u128 },

    /// Ticket amount is zero or the total price overflows.
    #[error("invalid ticket amount")]
    InvalidAmount,

    #[error("no ticket found for {0}")]
    NoTicket(Address),

    /// Tickets cannot be bought or looted by the zero address.
    #[error("the zero address cannot hold tickets")]
    ZeroBuyer,

    /// The nonce source failed. Nothing was queued.
    #[error("ticket entropy unavailable: {0}")]
    Entropy(String),

    #[error("no tiers registered")]
    NoTiers,

    /// The selected tier has no blueprints. Nothing was consumed.
    #[error("tier {0} has no blueprints")]
    EmptyTier(u64),

    /// The selected blueprint is exhausted. The ticket was consumed.
    #[error("blueprint {blueprint} of tier {tier} reached max supply {max_supply}")]
    CapacityExceeded {
        tier: u64,
        blueprint: usize,
        max_supply: u64,
    },

    /// The confidential registry failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Convenience result type for loot box operations.
pub type Result<T> = std::result::Result<T, LootError>;

/// Loot box limits and pricing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LootConfig {
    pub ticket_price: u128,
    pub max_blueprints_per_tier: usize,
    pub max_tier_supply: u64,
    pub max_total_supply: u64,
    /// Metadata of the collection allocation records are minted into.
    pub collection_name: String,
    pub collection_symbol: String,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            ticket_price: DEFAULT_TICKET_PRICE,
            max_blueprints_per_tier: 64,
            max_tier_supply: 1_000_000,
            max_total_supply: 10_000_000,
            collection_name: "Aether Loot".to_string(),
            collection_symbol: "ALOOT".to_string(),
        }
    }
}

/// The loot box context: configuration, tiers, tickets, and the allocation
/// collection.
pub struct LootBox {
    config: LootConfig,
    admin: Address,
    pub(crate) tiers: TierAllocationRegistry,
    pub(crate) tickets: TicketLedger,
    pub(crate) collection: ConfidentialCollection,
    collected: u128,
    pub(crate) events: EventLog,
}

impl LootBox {
    /// Create a loot box administered by `admin`, drawing ticket nonces
    /// from the operating system.
    ///
    /// The zero address as admin rejects every administrative call.
    pub fn new(config: LootConfig, admin: Address) -> Self {
        Self::with_tickets(config, admin, TicketLedger::new())
    }

    /// Like [`LootBox::new`], with ticket nonces drawn from `entropy`.
    pub fn with_entropy(
        config: LootConfig,
        admin: Address,
        entropy: impl RngCore + Send + 'static,
    ) -> Self {
        Self::with_tickets(config, admin, TicketLedger::with_entropy(entropy))
    }

    fn with_tickets(config: LootConfig, admin: Address, tickets: TicketLedger) -> Self {
        let collection =
            ConfidentialCollection::new(config.collection_name.clone(), config.collection_symbol.clone());
        tracing::info!(
            %admin,
            price = %config.ticket_price,
            collection = %collection.address(),
            "lootbox: created"
        );
        Self {
            config,
            admin,
            tiers: TierAllocationRegistry::new(),
            tickets,
            collection,
            collected: 0,
            events: EventLog::new(),
        }
    }

    pub fn config(&self) -> &LootConfig {
        &self.config
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Contract address of the allocation collection.
    pub fn address(&self) -> Address {
        self.collection.address()
    }

    pub fn collection(&self) -> &ConfidentialCollection {
        &self.collection
    }

    /// Total payments retained (purchases minus refunds).
    pub fn collected(&self) -> u128 {
        self.collected
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    // ---- administration ----

    pub fn add_tier(
        &mut self,
        caller: Address,
        name: &str,
        mask: Option<TierMask>,
        weight: u64,
    ) -> Result<TierMask> {
        self.require_admin(caller)?;
        let mask = self.tiers.add_tier(name, mask, weight).map_err(|e| {
            tracing::warn!(name, weight, error = %e, "lootbox: add_tier rejected");
            e
        })?;
        self.record(
            EventType::TierAdded,
            &serde_json::json!({ "name": name, "weight": weight, "mask": mask }),
        )?;
        tracing::info!(name, weight, mask, "lootbox: tier added");
        Ok(mask)
    }

    pub fn add_blueprint(
        &mut self,
        caller: Address,
        tier_weight: u64,
        name: &str,
        max_supply: u64,
    ) -> Result<usize> {
        self.require_admin(caller)?;
        let index = self
            .tiers
            .add_blueprint(&self.config, tier_weight, name, max_supply)
            .map_err(|e| {
                tracing::warn!(tier = tier_weight, name, error = %e, "lootbox: add_blueprint rejected");
                e
            })?;
        self.record(
            EventType::BlueprintAdded,
            &serde_json::json!({
                "tier": tier_weight,
                "index": index,
                "name": name,
                "max_supply": max_supply,
            }),
        )?;
        tracing::info!(tier = tier_weight, index, name, max_supply, "lootbox: blueprint added");
        Ok(index)
    }

    // ---- queries ----

    pub fn tier_count(&self) -> usize {
        self.tiers.tier_count()
    }

    pub fn tiers(&self) -> &[Tier] {
        self.tiers.tiers()
    }

    pub fn tier_by_weight(&self, weight: u64) -> Option<&Tier> {
        self.tiers.tier_by_weight(weight)
    }

    pub fn get_tier_blueprint_count(&self, tier_weight: u64) -> Result<usize> {
        self.tiers.blueprint_count(tier_weight)
    }

    pub fn get_blueprint_max_supply(&self, tier_weight: u64, index: usize) -> Result<u64> {
        self.tiers.blueprint_max_supply(tier_weight, index)
    }

    pub fn get_blueprint_issued(&self, tier_weight: u64, index: usize) -> Result<u64> {
        self.tiers.blueprint_issued(tier_weight, index)
    }

    // ---- tickets ----

    /// Buy `amount` tickets for `buyer`; overpayment is reported as `refund`.
    pub fn buy_ticket(
        &mut self,
        buyer: Address,
        label: &[u8],
        amount: u32,
        payment: u128,
    ) -> Result<Purchase> {
        let purchase = self
            .tickets
            .buy(self.config.ticket_price, buyer, label, amount, payment)
            .map_err(|e| {
                tracing::warn!(%buyer, amount, error = %e, "lootbox: purchase rejected");
                e
            })?;
        let retained = payment - purchase.refund;
        self.collected = self.collected.saturating_add(retained);
        self.record(
            EventType::TicketPurchased,
            &serde_json::json!({
                "buyer": buyer,
                "amount": amount,
                "paid": retained,
                "refund": purchase.refund,
            }),
        )?;
        tracing::debug!(%buyer, amount, refund = %purchase.refund, "lootbox: tickets purchased");
        Ok(purchase)
    }

    /// Consume the oldest ticket of `buyer` without resolving it.
    pub fn pop_ticket(&mut self, buyer: Address) -> Result<Ticket> {
        let ticket = self.tickets.pop(&buyer)?;
        self.record(EventType::TicketPopped, &ticket)?;
        Ok(ticket)
    }

    /// Consume the oldest ticket of `buyer` and return the price paid for it.
    pub fn refund_ticket(&mut self, buyer: Address) -> Result<u128> {
        let ticket = self.tickets.pop(&buyer)?;
        self.collected = self.collected.saturating_sub(ticket.price_paid);
        self.record(EventType::TicketRefunded, &ticket)?;
        tracing::debug!(%buyer, sequence = ticket.sequence, "lootbox: ticket refunded");
        Ok(ticket.price_paid)
    }

    pub fn pending_tickets(&self, buyer: &Address) -> usize {
        self.tickets.pending(buyer)
    }

    fn require_admin(&self, caller: Address) -> Result<()> {
        if self.admin.is_zero() || caller != self.admin {
            tracing::warn!(%caller, "lootbox: unauthorized admin call");
            return Err(LootError::Unauthorized(caller));
        }
        Ok(())
    }

    pub(crate) fn record<T: Serialize>(&mut self, event_type: EventType, payload: &T) -> Result<()> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| RegistryError::EventEncoding(e.to_string()))?;
        self.events.push(Event {
            contract: self.collection.address(),
            event_type,
            payload,
        });
        Ok(())
    }
}
