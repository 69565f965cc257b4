//! # aether-registry
//!
//! The confidential ownership registry.
//!
//! A [`ConfidentialCollection`] maps asset identifiers to encrypted owners,
//! accounts to encrypted balances, and `(owner, operator)` pairs to encrypted
//! approval flags. Every operation evaluates its preconditions as encrypted
//! booleans, folds them into an [`ObliviousErrorChannel`], and applies its
//! state change through `select`, so the same provider calls run whether the
//! call succeeds or fails.
//!
//! ## Modules
//!
//! - [`error_channel`] — Encrypted error-mask accumulation
//! - [`ownership`] — Mint, transfer, balance and owner queries
//! - [`approval`] — Operator approval for all assets of an owner
//! - [`events`] — Typed result records, receipts, and the event log

pub mod approval;
pub mod error_channel;
pub mod events;
pub mod ownership;

use aether_crypto::blake3;
use aether_fhe::{Encrypted, Fhe, FheError};
use aether_types::events::Event;
use aether_types::Address;

pub use approval::ApprovalStore;
pub use error_channel::{ErrorBit, ObliviousError, ObliviousErrorChannel};
pub use events::{
    BalanceResult, EventLog, ObliviousApprovalForAll, ObliviousTransfer, OwnerResult, Receipt,
};
pub use ownership::OwnershipRegistry;

/// Error types for registry operations.
///
/// Confidential precondition failures never appear here; they are reported
/// through the encrypted error mask.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The confidential-compute provider failed.
    #[error("provider error: {0}")]
    Fhe(#[from] FheError),

    /// A result record could not be encoded as an event payload.
    #[error("event encoding error: {0}")]
    EventEncoding(String),
}

/// Convenience result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Derive a contract address from a collection's name and symbol.
///
/// `address = BLAKE3::derive_key("Aether v1 contract-address", LE32-framed(name, symbol))[12..]`
pub fn derive_contract_address(name: &str, symbol: &str) -> Address {
    let input = blake3::encode_multi_field(&[name.as_bytes(), symbol.as_bytes()]);
    let digest = blake3::derive_key(blake3::contexts::CONTRACT_ADDRESS, &input);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

/// A confidential asset collection: metadata, stores, and event log.
pub struct ConfidentialCollection {
    name: String,
    symbol: String,
    address: Address,
    pub(crate) ownership: OwnershipRegistry,
    pub(crate) approvals: ApprovalStore,
    events: EventLog,
}

impl ConfidentialCollection {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        let name = name.into();
        let symbol = symbol.into();
        let address = derive_contract_address(&name, &symbol);
        tracing::info!(%name, %symbol, %address, "registry: collection created");
        Self {
            name,
            symbol,
            address,
            ownership: OwnershipRegistry::default(),
            approvals: ApprovalStore::default(),
            events: EventLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The contract address handles are bound to for user decryption.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Stored owner and balance handles.
    pub fn ownership(&self) -> &OwnershipRegistry {
        &self.ownership
    }

    /// Stored approval handles.
    pub fn approvals(&self) -> &ApprovalStore {
        &self.approvals
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub(crate) fn emit<E: events::ResultEvent>(&mut self, receipt: &Receipt<E>) -> Result<()> {
        self.events.record(self.address, receipt)
    }

    /// Allow this contract and each nonzero account in `accounts` to
    /// decrypt `value`.
    pub(crate) fn share<T: Encrypted>(
        &self,
        fhe: &mut Fhe<'_>,
        value: T,
        accounts: &[Address],
    ) -> Result<()> {
        fhe.allow(value, self.address)?;
        for account in accounts.iter().filter(|a| !a.is_zero()) {
            fhe.allow(value, *account)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use aether_fhe::{ConfidentialCompute, InProcessProvider, ProviderConfig};
    use aether_types::AssetId;

    #[test]
    fn test_zero_address_never_gains_access() {
        let mut provider = InProcessProvider::new(ProviderConfig::default());
        let mut collection = ConfidentialCollection::new("Aether", "AETH");
        let owner = Address([0xA1; 20]);

        let receipt = collection
            .set_approval_for_all(&mut provider, owner, Address::ZERO, true)
            .expect("approval");
        let flag = receipt.result.approved.handle();
        assert!(provider.is_allowed(flag, owner));
        assert!(provider.is_allowed(flag, collection.address()));
        assert!(!provider.is_allowed(flag, Address::ZERO));
        assert!(!provider.is_allowed(receipt.result.owner.handle(), Address::ZERO));

        // A transfer to zero fails, and the zero balance slot stays private.
        let id = AssetId::from(1u64);
        collection
            .mint(&mut provider, owner, owner, id)
            .expect("mint");
        collection
            .transfer_from(&mut provider, owner, owner, Address::ZERO, id)
            .expect("transfer");
        let zero_balance = collection
            .ownership()
            .balance_handle(&Address::ZERO)
            .expect("slot written");
        assert!(!provider.is_allowed(zero_balance.handle(), Address::ZERO));
    }

    #[test]
    fn test_metadata() {
        let collection = ConfidentialCollection::new("Aether", "AETH");
        assert_eq!(collection.name(), "Aether");
        assert_eq!(collection.symbol(), "AETH");
        assert!(collection.events().is_empty());
    }

    #[test]
    fn test_contract_address_depends_on_metadata() {
        let a = derive_contract_address("Aether", "AETH");
        assert_eq!(a, derive_contract_address("Aether", "AETH"));
        assert_ne!(a, derive_contract_address("Aether", "AETX"));
        assert!(!a.is_zero());
    }
}
