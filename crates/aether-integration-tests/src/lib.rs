//! Integration test crate for the Aether ledger.
//!
//! The scenarios live under `tests/`; this library only holds the account
//! and decryption helpers they share. Every decryption goes through the
//! provider's `user_decrypt` with a freshly signed grant, exactly as an
//! external client would.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p aether-integration-tests
//! ```

use aether_crypto::ed25519::KeyPair;
use aether_fhe::{
    ConfidentialCompute, DecryptRequest, DecryptionGrant, FheError, Handle, Plaintext,
};
use aether_registry::ErrorBit;
use aether_types::Address;

/// Simulated wall clock for deterministic grants.
pub const TEST_TIMESTAMP: u64 = 1_700_000_000;

/// A named account holding its own signing key.
pub struct Account {
    pub name: &'static str,
    pub keys: KeyPair,
    pub address: Address,
}

impl Account {
    /// An account with a key derived from `seed`, so runs are reproducible.
    pub fn new(name: &'static str, seed: u8) -> Self {
        let keys = KeyPair::from_bytes(&[seed; 32]);
        let address = Address::from_bytes(keys.address_bytes());
        Self {
            name,
            keys,
            address,
        }
    }

    /// A one-day grant for `contract`, valid at [`TEST_TIMESTAMP`].
    pub fn grant(&self, contract: Address) -> DecryptionGrant {
        DecryptionGrant::sign(&self.keys, vec![contract], TEST_TIMESTAMP, 1)
    }

    /// Decrypt `handle` produced by `contract`.
    pub fn decrypt(
        &self,
        provider: &dyn ConfidentialCompute,
        contract: Address,
        handle: Handle,
    ) -> Result<Plaintext, FheError> {
        let request = DecryptRequest {
            contract,
            grant: self.grant(contract),
            now: TEST_TIMESTAMP,
        };
        provider.user_decrypt(handle, &request)
    }

    /// Decrypt an encrypted counter.
    pub fn decrypt_u64(
        &self,
        provider: &dyn ConfidentialCompute,
        contract: Address,
        handle: Handle,
    ) -> Result<Option<u64>, FheError> {
        Ok(self.decrypt(provider, contract, handle)?.as_u64())
    }

    /// Decrypt an encrypted address.
    pub fn decrypt_address(
        &self,
        provider: &dyn ConfidentialCompute,
        contract: Address,
        handle: Handle,
    ) -> Result<Option<Address>, FheError> {
        Ok(self.decrypt(provider, contract, handle)?.as_address())
    }

    /// Decrypt an error mask into the failure bits it carries.
    pub fn decrypt_errors(
        &self,
        provider: &dyn ConfidentialCompute,
        contract: Address,
        mask: Handle,
    ) -> Result<Vec<ErrorBit>, FheError> {
        let mask = match self.decrypt(provider, contract, mask)? {
            Plaintext::Uint8(mask) => mask,
            other => {
                return Err(FheError::TypeMismatch {
                    expected: aether_fhe::FheType::Uint8,
                    actual: other.fhe_type(),
                })
            }
        };
        Ok(ErrorBit::decode(mask))
    }
}
