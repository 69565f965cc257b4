//! Loot resolution: seed rolls, weighted tier selection, and allocation.
//!
//! Rolls are keyed by the ticket's undisclosed nonce, so neither the buyer
//! nor anyone reading the published commitment can steer them with `seed`:
//!
//! ```text
//! roll(label) = LE64(BLAKE3::keyed_hash(nonce, label || seed)[0..8])
//! tier        = first i with  tier_roll % Σw  <  w_0 + … + w_i   (registration order)
//! blueprint   = blueprint_roll % blueprint_count
//! asset_id    = BLAKE3::derive_key("Aether v1 loot-asset-id",
//!                   LE32-framed(LE32(tier_mask), LE64(blueprint_index), LE64(instance)))
//! ```
//!
//! Blueprint selection is uniform over every blueprint of the tier,
//! including exhausted ones. A successful loot reveals the nonce in its
//! outcome and in the `LootResolved` event.

use aether_crypto::blake3;
use aether_fhe::ConfidentialCompute;
use aether_registry::{ObliviousTransfer, Receipt};
use aether_types::events::{Event, EventType};
use aether_types::{Address, AssetId};
use serde::Serialize;
use serde_with::serde_as;

use crate::tickets::{Ticket, NONCE_LEN};
use crate::tiers::TierMask;
use crate::{LootBox, LootError, Result};

/// Roll label for tier selection.
pub const TIER_LABEL: &[u8] = b"tier";
/// Roll label for blueprint selection.
pub const BLUEPRINT_LABEL: &[u8] = b"blueprint";

/// Derive a 64-bit roll from a ticket nonce, a label, and the caller's seed.
pub fn roll(nonce: &[u8; NONCE_LEN], label: &[u8], seed: &[u8]) -> u64 {
    let mut message = Vec::with_capacity(label.len() + seed.len());
    message.extend_from_slice(label);
    message.extend_from_slice(seed);
    blake3::digest_to_u64(&blake3::keyed_hash(nonce, &message))
}

/// Index of the tier picked by `roll` over `weights` in registration order.
///
/// `None` when there are no weights, the sum is zero, or the sum overflows.
pub fn select_tier(weights: &[u64], roll: u64) -> Option<usize> {
    let total = weights
        .iter()
        .try_fold(0u64, |acc, w| acc.checked_add(*w))?;
    if total == 0 {
        return None;
    }
    let pick = roll % total;
    let mut cumulative = 0u64;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if pick < cumulative {
            return Some(index);
        }
    }
    None
}

/// Index of the blueprint picked by `roll` among `count` blueprints.
pub fn select_blueprint(count: usize, roll: u64) -> Option<usize> {
    if count == 0 {
        return None;
    }
    usize::try_from(roll % count as u64).ok()
}

/// Identifier of an issued loot instance.
pub fn derive_loot_asset_id(tier_mask: TierMask, blueprint_index: usize, instance: u64) -> AssetId {
    let input = blake3::encode_multi_field(&[
        &tier_mask.to_le_bytes(),
        &(blueprint_index as u64).to_le_bytes(),
        &instance.to_le_bytes(),
    ]);
    AssetId::from_bytes(blake3::derive_key(blake3::contexts::LOOT_ASSET_ID, &input))
}

/// The result of a successful loot.
#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct LootOutcome {
    pub ticket: Ticket,
    /// The ticket's nonce, disclosed now that the ticket is spent.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub nonce: [u8; NONCE_LEN],
    pub tier_name: String,
    pub tier_weight: u64,
    pub tier_mask: TierMask,
    pub blueprint_index: usize,
    pub blueprint_name: String,
    /// 0-based instance index within the blueprint.
    pub instance: u64,
    pub asset_id: AssetId,
    /// Confidential mint of the allocation record to the caller.
    pub mint: Receipt<ObliviousTransfer>,
}

struct Selection {
    tier_name: String,
    tier_weight: u64,
    tier_mask: TierMask,
    blueprint_index: usize,
    blueprint_name: String,
    exhausted: Option<u64>,
}

impl LootBox {
    /// Consume one ticket of `caller` and allocate an item.
    ///
    /// # Errors
    ///
    /// - [`LootError::ZeroBuyer`] / [`LootError::NoTicket`] /
    ///   [`LootError::NoTiers`] / [`LootError::EmptyTier`]: nothing is consumed
    /// - [`LootError::CapacityExceeded`]: the ticket **is** consumed and not
    ///   refunded
    pub fn loot(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        seed: &[u8],
    ) -> Result<LootOutcome> {
        if caller.is_zero() {
            return Err(LootError::ZeroBuyer);
        }
        let nonce = {
            let (_, nonce) = self
                .tickets
                .head(&caller)
                .ok_or(LootError::NoTicket(caller))?;
            *nonce
        };
        let selection = self.select(&nonce, seed)?;

        if let Some(max_supply) = selection.exhausted {
            let ticket = self.tickets.pop(&caller)?;
            self.record(EventType::TicketPopped, &ticket)?;
            tracing::warn!(
                %caller,
                sequence = ticket.sequence,
                tier = selection.tier_weight,
                blueprint = selection.blueprint_index,
                "lootbox: blueprint exhausted, ticket consumed"
            );
            return Err(LootError::CapacityExceeded {
                tier: selection.tier_weight,
                blueprint: selection.blueprint_index,
                max_supply,
            });
        }

        let instance = self
            .tiers
            .blueprint_issued(selection.tier_weight, selection.blueprint_index)?;
        let asset_id = derive_loot_asset_id(selection.tier_mask, selection.blueprint_index, instance);

        // Mint first: a provider failure leaves ticket and counts untouched.
        let mint = self.collection.mint(provider, caller, caller, asset_id)?;
        let ticket = self.tickets.pop(&caller)?;
        self.tiers
            .issue(selection.tier_weight, selection.blueprint_index)?;

        let outcome = LootOutcome {
            ticket,
            nonce,
            tier_name: selection.tier_name,
            tier_weight: selection.tier_weight,
            tier_mask: selection.tier_mask,
            blueprint_index: selection.blueprint_index,
            blueprint_name: selection.blueprint_name,
            instance,
            asset_id,
            mint,
        };
        let collection_events = self.collection.drain_events();
        self.events_extend(collection_events);
        self.record(
            EventType::LootResolved,
            &serde_json::json!({
                "buyer": caller,
                "sequence": outcome.ticket.sequence,
                "nonce": hex::encode(outcome.nonce),
            }),
        )?;
        tracing::info!(
            %caller,
            sequence = outcome.ticket.sequence,
            "lootbox: loot resolved"
        );
        Ok(outcome)
    }

    fn select(&self, nonce: &[u8; NONCE_LEN], seed: &[u8]) -> Result<Selection> {
        if self.tiers.tier_count() == 0 {
            return Err(LootError::NoTiers);
        }
        let tier_roll = roll(nonce, TIER_LABEL, seed);
        let tier_index =
            select_tier(&self.tiers.weights(), tier_roll).ok_or(LootError::NoTiers)?;
        let tier = self
            .tiers
            .tiers()
            .get(tier_index)
            .ok_or(LootError::NoTiers)?;

        let blueprint_roll = roll(nonce, BLUEPRINT_LABEL, seed);
        let blueprint_index = select_blueprint(tier.blueprints.len(), blueprint_roll)
            .ok_or(LootError::EmptyTier(tier.weight))?;
        let blueprint = tier
            .blueprints
            .get(blueprint_index)
            .ok_or(LootError::EmptyTier(tier.weight))?;

        Ok(Selection {
            tier_name: tier.name.clone(),
            tier_weight: tier.weight,
            tier_mask: tier.mask,
            blueprint_index,
            blueprint_name: blueprint.name.clone(),
            exhausted: blueprint.is_exhausted().then_some(blueprint.max_supply),
        })
    }

    fn events_extend(&mut self, events: Vec<Event>) {
        for event in events {
            self.events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::derive_seed_commitment;
    use crate::LootConfig;
    use aether_fhe::{InProcessProvider, ProviderConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ADMIN: Address = Address([0xAD; 20]);
    const BUYER: Address = Address([0xB7; 20]);
    const PRICE: u128 = 10;

    fn seeded_box(seed: u8) -> LootBox {
        let config = LootConfig {
            ticket_price: PRICE,
            ..LootConfig::default()
        };
        LootBox::with_entropy(config, ADMIN, StdRng::from_seed([seed; 32]))
    }

    /// A seed whose blueprint roll under the head ticket lands on `want`.
    fn seed_landing_on(lootbox: &LootBox, count: usize, want: usize) -> Vec<u8> {
        let (_, nonce) = lootbox.tickets.head(&BUYER).expect("queued ticket");
        (0u32..10_000)
            .map(|i| i.to_le_bytes().to_vec())
            .find(|s| select_blueprint(count, roll(nonce, BLUEPRINT_LABEL, s)) == Some(want))
            .expect("some seed lands on the blueprint")
    }

    #[test]
    fn test_public_data_does_not_steer_the_tier() {
        let mut lootbox = seeded_box(7);
        let weights = [999u64, 1];
        for (name, weight) in [("Normal", 999u64), ("Legendary", 1)] {
            lootbox.add_tier(ADMIN, name, None, weight).expect("tier");
            lootbox.add_blueprint(ADMIN, weight, "Item", 1_000).expect("bp");
        }
        let rounds = 20u32;
        let purchase = lootbox
            .buy_ticket(BUYER, b"box", rounds, u128::from(rounds) * PRICE)
            .expect("buy");

        let mut provider = InProcessProvider::new(ProviderConfig::default());
        let mut legendary = 0;
        for ticket in &purchase.tickets {
            // Search for a seed that picks the rare tier from what the buyer
            // can see: the published commitment.
            let seed = (0u32..100_000)
                .map(|i| i.to_le_bytes())
                .find(|s| {
                    select_tier(&weights, roll(&ticket.seed_commitment, TIER_LABEL, s)) == Some(1)
                })
                .expect("a matching seed exists");
            let outcome = lootbox.loot(&mut provider, BUYER, &seed).expect("loot");
            if outcome.tier_weight == 1 {
                legendary += 1;
            }

            // The revealed nonce opens the commitment and explains the pick.
            assert_eq!(
                derive_seed_commitment(b"box", &BUYER, ticket.sequence, &outcome.nonce),
                ticket.seed_commitment
            );
            let actual = select_tier(&weights, roll(&outcome.nonce, TIER_LABEL, &seed));
            assert_eq!(actual.map(|i| weights[i]), Some(outcome.tier_weight));
        }
        assert!(legendary <= 2, "rare tier hit {legendary} of {rounds} times");
    }

    #[test]
    fn test_full_blueprint_is_not_rerolled() {
        let mut lootbox = seeded_box(3);
        lootbox.add_tier(ADMIN, "Mixed", None, 5).expect("tier");
        lootbox.add_blueprint(ADMIN, 5, "Relic", 1).expect("bp");
        lootbox.add_blueprint(ADMIN, 5, "Charm", 10).expect("bp");
        lootbox.buy_ticket(BUYER, b"box", 3, 3 * PRICE).expect("buy");
        let mut provider = InProcessProvider::new(ProviderConfig::default());

        let seed = seed_landing_on(&lootbox, 2, 0);
        let first = lootbox.loot(&mut provider, BUYER, &seed).expect("relic");
        assert_eq!(first.blueprint_name, "Relic");
        lootbox.drain_events();

        // The roll lands on the full Relic while Charm still has room.
        let seed = seed_landing_on(&lootbox, 2, 0);
        let err = lootbox
            .loot(&mut provider, BUYER, &seed)
            .expect_err("relic is full");
        assert!(matches!(
            err,
            LootError::CapacityExceeded {
                tier: 5,
                blueprint: 0,
                max_supply: 1
            }
        ));
        assert_eq!(lootbox.get_blueprint_issued(5, 0).expect("issued"), 1);
        assert_eq!(lootbox.get_blueprint_issued(5, 1).expect("issued"), 0);
        assert_eq!(lootbox.pending_tickets(&BUYER), 1);
        let types: Vec<EventType> = lootbox.drain_events().iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::TicketPopped]);

        let seed = seed_landing_on(&lootbox, 2, 1);
        let last = lootbox.loot(&mut provider, BUYER, &seed).expect("charm");
        assert_eq!(last.blueprint_name, "Charm");
        assert_eq!(lootbox.pending_tickets(&BUYER), 0);
    }

    #[test]
    fn test_select_tier_boundaries() {
        let weights = [100, 50, 20];
        assert_eq!(select_tier(&weights, 0), Some(0));
        assert_eq!(select_tier(&weights, 99), Some(0));
        assert_eq!(select_tier(&weights, 100), Some(1));
        assert_eq!(select_tier(&weights, 149), Some(1));
        assert_eq!(select_tier(&weights, 150), Some(2));
        assert_eq!(select_tier(&weights, 169), Some(2));
        // Wraps modulo the total.
        assert_eq!(select_tier(&weights, 170), Some(0));
    }

    #[test]
    fn test_select_tier_degenerate() {
        assert_eq!(select_tier(&[], 5), None);
        assert_eq!(select_tier(&[u64::MAX, 1], 5), None);
        assert_eq!(select_tier(&[7], u64::MAX), Some(0));
    }

    #[test]
    fn test_select_tier_proportional() {
        let weights = [3, 1];
        let picks: Vec<usize> = (0..8)
            .map(|r| select_tier(&weights, r).expect("tier"))
            .collect();
        assert_eq!(picks, vec![0, 0, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_select_blueprint() {
        assert_eq!(select_blueprint(0, 3), None);
        assert_eq!(select_blueprint(3, 7), Some(1));
        assert_eq!(select_blueprint(1, u64::MAX), Some(0));
    }

    #[test]
    fn test_rolls_are_label_separated() {
        let nonce = [0x11; 32];
        assert_ne!(
            roll(&nonce, TIER_LABEL, b"seed"),
            roll(&nonce, BLUEPRINT_LABEL, b"seed")
        );
        assert_eq!(
            roll(&nonce, TIER_LABEL, b"seed"),
            roll(&nonce, TIER_LABEL, b"seed")
        );
        assert_ne!(
            roll(&nonce, TIER_LABEL, b"seed"),
            roll(&[0x12; 32], TIER_LABEL, b"seed")
        );
    }

    #[test]
    fn test_asset_ids_distinct_per_instance() {
        let a = derive_loot_asset_id(0b1, 0, 0);
        assert_ne!(a, derive_loot_asset_id(0b1, 0, 1));
        assert_ne!(a, derive_loot_asset_id(0b1, 1, 0));
        assert_ne!(a, derive_loot_asset_id(0b10, 0, 0));
    }
}
