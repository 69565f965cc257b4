//! Configuration file management.

use std::path::PathBuf;

use aether_fhe::ProviderConfig;
use aether_lootbox::LootConfig;
use aether_types::{parse_fixed_hex, Address};
use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub lootbox: LootboxConfig,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Metadata of the primary confidential collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
    #[serde(default = "default_collection_symbol")]
    pub symbol: String,
}

/// Loot box limits, pricing and administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootboxConfig {
    /// Price of one ticket in base currency units.
    #[serde(default = "default_ticket_price")]
    pub ticket_price: u64,
    /// Hex address of the administrator. The zero address disables
    /// administration.
    #[serde(default = "default_admin")]
    pub admin: String,
    #[serde(default = "default_max_blueprints_per_tier")]
    pub max_blueprints_per_tier: usize,
    #[serde(default = "default_max_tier_supply")]
    pub max_tier_supply: u64,
    #[serde(default = "default_max_total_supply")]
    pub max_total_supply: u64,
    /// Tiers registered at start-up through the admin path.
    #[serde(default)]
    pub tiers: Vec<TierBootstrap>,
}

/// One `[[lootbox.tiers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierBootstrap {
    pub name: String,
    pub weight: u64,
    /// Explicit single-bit mask. Absent = next unused bit.
    #[serde(default)]
    pub mask: Option<u32>,
    #[serde(default)]
    pub blueprints: Vec<BlueprintBootstrap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintBootstrap {
    pub name: String,
    pub max_supply: u64,
}

/// In-process provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// 32-byte hex network key. Empty = random per process.
    #[serde(default)]
    pub network_key_hex: String,
    #[serde(default = "default_grant_max_duration_days")]
    pub grant_max_duration_days: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Socket path. Empty = $data_dir/aether.sock.
    #[serde(default)]
    pub socket_path: String,
}

// Default value functions

fn default_collection_name() -> String {
    "Aether".to_string()
}

fn default_collection_symbol() -> String {
    "AETH".to_string()
}

fn default_ticket_price() -> u64 {
    100_000_000_000
}

fn default_admin() -> String {
    Address::ZERO.to_string()
}

fn default_max_blueprints_per_tier() -> usize {
    64
}

fn default_max_tier_supply() -> u64 {
    1_000_000
}

fn default_max_total_supply() -> u64 {
    10_000_000
}

fn default_grant_max_duration_days() -> u64 {
    365
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            symbol: default_collection_symbol(),
        }
    }
}

impl Default for LootboxConfig {
    fn default() -> Self {
        Self {
            ticket_price: default_ticket_price(),
            admin: default_admin(),
            max_blueprints_per_tier: default_max_blueprints_per_tier(),
            max_tier_supply: default_max_tier_supply(),
            max_total_supply: default_max_total_supply(),
            tiers: Vec::new(),
        }
    }
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            network_key_hex: String::new(),
            grant_max_duration_days: default_grant_max_duration_days(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            socket_path: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from `$AETHER_DATA_DIR/config.toml`.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::default_data_dir()
    }

    /// Get the JSON-RPC socket path.
    pub fn socket_path(&self) -> PathBuf {
        if self.advanced.socket_path.is_empty() {
            self.data_dir().join("aether.sock")
        } else {
            PathBuf::from(&self.advanced.socket_path)
        }
    }

    /// The configured administrator address.
    pub fn admin(&self) -> anyhow::Result<Address> {
        Ok(self.lootbox.admin.parse()?)
    }

    pub fn loot_config(&self) -> LootConfig {
        LootConfig {
            ticket_price: u128::from(self.lootbox.ticket_price),
            max_blueprints_per_tier: self.lootbox.max_blueprints_per_tier,
            max_tier_supply: self.lootbox.max_tier_supply,
            max_total_supply: self.lootbox.max_total_supply,
            ..LootConfig::default()
        }
    }

    pub fn provider_config(&self) -> anyhow::Result<ProviderConfig> {
        let network_key = if self.provider.network_key_hex.is_empty() {
            None
        } else {
            Some(parse_fixed_hex::<32>(&self.provider.network_key_hex)?)
        };
        Ok(ProviderConfig {
            network_key,
            grant_max_duration_days: self.provider.grant_max_duration_days,
        })
    }

    /// The tracing filter directive for the configured level.
    pub fn log_directive(&self) -> String {
        format!("aether={}", self.advanced.log_level)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("AETHER_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Aether")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".aether")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/aether"))
}
