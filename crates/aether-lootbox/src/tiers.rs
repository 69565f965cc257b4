//! Tier and blueprint configuration.
//!
//! Tiers are kept in registration order, which is also the order weighted
//! selection scans them in. A tier is addressed by its weight; weights,
//! names, and masks are each unique across tiers.

use serde::{Deserialize, Serialize};

use crate::{LootConfig, LootError, Result};

/// Single-bit tier mask.
pub type TierMask = u32;

/// An item template with a capped supply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    pub max_supply: u64,
    /// Instances issued so far. Never exceeds `max_supply`.
    pub issued: u64,
}

impl Blueprint {
    pub fn is_exhausted(&self) -> bool {
        self.issued >= self.max_supply
    }
}

/// A rarity tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub weight: u64,
    pub mask: TierMask,
    pub blueprints: Vec<Blueprint>,
}

impl Tier {
    /// Sum of declared max supplies of this tier's blueprints.
    pub fn declared_supply(&self) -> u64 {
        self.blueprints.iter().map(|b| b.max_supply).sum()
    }
}

/// Registered tiers and their blueprints.
#[derive(Debug, Default)]
pub struct TierAllocationRegistry {
    tiers: Vec<Tier>,
}

impl TierAllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tier and return its mask.
    ///
    /// With `mask == None` the lowest unused power of two is assigned.
    pub fn add_tier(&mut self, name: &str, mask: Option<TierMask>, weight: u64) -> Result<TierMask> {
        if weight == 0 {
            return Err(LootError::InvalidWeight);
        }
        if let Some(mask) = mask {
            if !mask.is_power_of_two() {
                return Err(LootError::InvalidMask(mask));
            }
        }
        if self.tiers.iter().any(|t| t.name == name) {
            return Err(LootError::DuplicateTier(format!("name {name}")));
        }
        if self.tier_by_weight(weight).is_some() {
            return Err(LootError::DuplicateTier(format!("weight {weight}")));
        }

        let used: TierMask = self.tiers.iter().fold(0, |acc, t| acc | t.mask);
        let mask = match mask {
            Some(mask) if used & mask != 0 => {
                return Err(LootError::DuplicateTier(format!("mask {mask:#x}")));
            }
            Some(mask) => mask,
            None => {
                let free = !used;
                if free == 0 {
                    return Err(LootError::CapacityOverflow("all tier masks in use".into()));
                }
                1 << free.trailing_zeros()
            }
        };

        self.total_weight()?
            .checked_add(weight)
            .ok_or_else(|| LootError::CapacityOverflow("total tier weight".into()))?;

        self.tiers.push(Tier {
            name: name.to_string(),
            weight,
            mask,
            blueprints: Vec::new(),
        });
        Ok(mask)
    }

    /// Add a blueprint to the tier with `tier_weight` and return its index.
    pub fn add_blueprint(
        &mut self,
        limits: &LootConfig,
        tier_weight: u64,
        name: &str,
        max_supply: u64,
    ) -> Result<usize> {
        let total_supply = self.total_declared_supply();
        let tier = self
            .tiers
            .iter_mut()
            .find(|t| t.weight == tier_weight)
            .ok_or(LootError::UnknownTier(tier_weight))?;

        if max_supply == 0 {
            return Err(LootError::InvalidSupply);
        }
        if tier.blueprints.iter().any(|b| b.name == name) {
            return Err(LootError::DuplicateBlueprint {
                tier: tier_weight,
                name: name.to_string(),
            });
        }
        if tier.blueprints.len() >= limits.max_blueprints_per_tier {
            return Err(LootError::CapacityOverflow(format!(
                "tier {tier_weight} already has {} blueprints",
                tier.blueprints.len()
            )));
        }
        let tier_supply = tier.declared_supply().checked_add(max_supply);
        if tier_supply.map_or(true, |s| s > limits.max_tier_supply) {
            return Err(LootError::CapacityOverflow(format!(
                "tier {tier_weight} supply would exceed {}",
                limits.max_tier_supply
            )));
        }
        let total = total_supply.checked_add(max_supply);
        if total.map_or(true, |s| s > limits.max_total_supply) {
            return Err(LootError::CapacityOverflow(format!(
                "total supply would exceed {}",
                limits.max_total_supply
            )));
        }

        tier.blueprints.push(Blueprint {
            name: name.to_string(),
            max_supply,
            issued: 0,
        });
        Ok(tier.blueprints.len() - 1)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// All tiers in registration order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier_by_weight(&self, weight: u64) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.weight == weight)
    }

    /// Tier weights in registration order.
    pub fn weights(&self) -> Vec<u64> {
        self.tiers.iter().map(|t| t.weight).collect()
    }

    pub fn total_weight(&self) -> Result<u64> {
        self.tiers
            .iter()
            .try_fold(0u64, |acc, t| acc.checked_add(t.weight))
            .ok_or_else(|| LootError::CapacityOverflow("total tier weight".into()))
    }

    pub fn blueprint_count(&self, tier_weight: u64) -> Result<usize> {
        Ok(self.tier(tier_weight)?.blueprints.len())
    }

    pub fn blueprint(&self, tier_weight: u64, index: usize) -> Result<&Blueprint> {
        self.tier(tier_weight)?
            .blueprints
            .get(index)
            .ok_or(LootError::UnknownBlueprint {
                tier: tier_weight,
                index,
            })
    }

    pub fn blueprint_max_supply(&self, tier_weight: u64, index: usize) -> Result<u64> {
        Ok(self.blueprint(tier_weight, index)?.max_supply)
    }

    pub fn blueprint_issued(&self, tier_weight: u64, index: usize) -> Result<u64> {
        Ok(self.blueprint(tier_weight, index)?.issued)
    }

    /// Record one issued instance and return its 0-based instance index.
    pub(crate) fn issue(&mut self, tier_weight: u64, index: usize) -> Result<u64> {
        let tier = self
            .tiers
            .iter_mut()
            .find(|t| t.weight == tier_weight)
            .ok_or(LootError::UnknownTier(tier_weight))?;
        let blueprint = tier
            .blueprints
            .get_mut(index)
            .ok_or(LootError::UnknownBlueprint {
                tier: tier_weight,
                index,
            })?;
        if blueprint.is_exhausted() {
            return Err(LootError::CapacityExceeded {
                tier: tier_weight,
                blueprint: index,
                max_supply: blueprint.max_supply,
            });
        }
        let instance = blueprint.issued;
        blueprint.issued += 1;
        Ok(instance)
    }

    fn tier(&self, weight: u64) -> Result<&Tier> {
        self.tier_by_weight(weight).ok_or(LootError::UnknownTier(weight))
    }

    fn total_declared_supply(&self) -> u64 {
        self.tiers
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.declared_supply()))
    }
}
