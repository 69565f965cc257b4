//! The ledger served by the daemon: one provider, one primary collection,
//! and one loot box.

use aether_fhe::InProcessProvider;
use aether_lootbox::LootBox;
use aether_registry::ConfidentialCollection;
use aether_types::events::Event;
use tracing::info;

use crate::config::DaemonConfig;

pub struct Ledger {
    pub provider: InProcessProvider,
    pub collection: ConfidentialCollection,
    pub lootbox: LootBox,
}

impl Ledger {
    /// Build the ledger and apply the configured tier bootstrap.
    pub fn from_config(config: &DaemonConfig) -> anyhow::Result<Self> {
        let admin = config.admin()?;
        let mut ledger = Self {
            provider: InProcessProvider::new(config.provider_config()?),
            collection: ConfidentialCollection::new(
                config.collection.name.clone(),
                config.collection.symbol.clone(),
            ),
            lootbox: LootBox::new(config.loot_config(), admin),
        };

        for tier in &config.lootbox.tiers {
            ledger
                .lootbox
                .add_tier(admin, &tier.name, tier.mask, tier.weight)?;
            for blueprint in &tier.blueprints {
                ledger.lootbox.add_blueprint(
                    admin,
                    tier.weight,
                    &blueprint.name,
                    blueprint.max_supply,
                )?;
            }
        }
        if !config.lootbox.tiers.is_empty() {
            info!(
                tiers = ledger.lootbox.tier_count(),
                "daemon: loot tiers bootstrapped"
            );
        }
        Ok(ledger)
    }

    /// Take every event recorded by the collection and the loot box.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = self.collection.drain_events();
        events.extend(self.lootbox.drain_events());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlueprintBootstrap, TierBootstrap};
    use aether_types::Address;

    #[test]
    fn test_bootstrap_applies_tiers() {
        let mut config = DaemonConfig::default();
        config.lootbox.admin = Address([0xAD; 20]).to_string();
        config.lootbox.tiers = vec![TierBootstrap {
            name: "common".to_string(),
            weight: 90,
            mask: None,
            blueprints: vec![BlueprintBootstrap {
                name: "shield".to_string(),
                max_supply: 3,
            }],
        }];

        let mut ledger = Ledger::from_config(&config).expect("ledger");
        assert_eq!(ledger.lootbox.tier_count(), 1);
        assert_eq!(ledger.lootbox.get_tier_blueprint_count(90).expect("count"), 1);
        assert_eq!(ledger.drain_events().len(), 2);
        assert!(ledger.drain_events().is_empty());
    }

    #[test]
    fn test_bootstrap_without_admin_fails() {
        let mut config = DaemonConfig::default();
        config.lootbox.tiers = vec![TierBootstrap {
            name: "common".to_string(),
            weight: 90,
            mask: None,
            blueprints: Vec::new(),
        }];
        assert!(Ledger::from_config(&config).is_err());
    }
}
