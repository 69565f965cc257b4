//! Signed user-decryption grants.
//!
//! A grant authorizes decryption of handles for one requester, for a fixed
//! list of contracts, within a bounded time window. The requester signs
//!
//! ```text
//! digest = BLAKE3::derive_key("Aether v1 decryption-grant",
//!              LE32-framed(public_key, contracts, LE64(start), LE64(days)))
//! ```
//!
//! with their Ed25519 key. The requester's ledger address is derived from
//! the public key, so a grant can never speak for another account.

use aether_crypto::blake3;
use aether_crypto::ed25519::{self, KeyPair, Signature, VerifyingKey};
use aether_types::{Address, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};

use crate::{FheError, Result};

/// A signed, time-bounded, contract-bound decryption authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionGrant {
    pub public_key: VerifyingKey,
    pub contracts: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub signature: Signature,
}

impl DecryptionGrant {
    /// Create and sign a grant with the requester's keypair.
    pub fn sign(
        keypair: &KeyPair,
        contracts: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        let digest = Self::digest(
            &keypair.verifying_key,
            &contracts,
            start_timestamp,
            duration_days,
        );
        let signature = keypair.sign(&digest);
        Self {
            public_key: keypair.verifying_key,
            contracts,
            start_timestamp,
            duration_days,
            signature,
        }
    }

    /// The digest a grant's signature covers.
    pub fn digest(
        public_key: &VerifyingKey,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> [u8; 32] {
        let contract_bytes: Vec<u8> = contracts
            .iter()
            .flat_map(|c| c.as_bytes().iter().copied())
            .collect();
        let input = blake3::encode_multi_field(&[
            public_key.as_bytes(),
            &contract_bytes,
            &start_timestamp.to_le_bytes(),
            &duration_days.to_le_bytes(),
        ]);
        blake3::derive_key(blake3::contexts::DECRYPTION_GRANT, &input)
    }

    /// The ledger address of the requester.
    pub fn requester(&self) -> Address {
        Address::from_bytes(ed25519::derive_address_bytes(&self.public_key))
    }

    /// First second at which the grant is no longer valid.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// Whether the grant names `contract`.
    pub fn covers(&self, contract: &Address) -> bool {
        self.contracts.contains(contract)
    }

    /// Check the signature and the validity window at time `now`.
    ///
    /// # Errors
    ///
    /// - [`FheError::GrantTooLong`] if the duration exceeds `max_duration_days`
    /// - [`FheError::GrantSignature`] if the signature does not verify
    /// - [`FheError::GrantNotYetValid`] if `now` precedes the start
    /// - [`FheError::GrantExpired`] if the window has closed
    pub fn verify(&self, now: u64, max_duration_days: u64) -> Result<()> {
        if self.duration_days > max_duration_days {
            return Err(FheError::GrantTooLong {
                days: self.duration_days,
                max: max_duration_days,
            });
        }

        let digest = Self::digest(
            &self.public_key,
            &self.contracts,
            self.start_timestamp,
            self.duration_days,
        );
        ed25519::verify(&self.public_key, &digest, &self.signature)
            .map_err(|_| FheError::GrantSignature)?;

        if now < self.start_timestamp {
            return Err(FheError::GrantNotYetValid {
                start: self.start_timestamp,
                now,
            });
        }
        let expires_at = self.expires_at();
        if now >= expires_at {
            return Err(FheError::GrantExpired { expires_at, now });
        }
        Ok(())
    }
}
