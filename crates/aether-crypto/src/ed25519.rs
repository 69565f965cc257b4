//! Account keys.
//!
//! An account is an Ed25519 key. Its 20-byte ledger address is the tail of
//! `BLAKE3::hash(public_key)`, so a signature by the key speaks for exactly
//! one address. Keys only sign decryption grants; the confidential path
//! never sees them.

use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroizing;

pub use ed25519_dalek::{Signature, VerifyingKey};

use crate::{CryptoError, Result};

/// Length in bytes of a ledger address.
pub const ADDRESS_LEN: usize = 20;

/// An account's signing key and its public half.
///
/// The secret is wiped on drop.
pub struct KeyPair {
    secret: SigningKey,
    /// Published inside every grant the account signs.
    pub verifying_key: VerifyingKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Deterministic keypair from a 32-byte secret.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        let secret = Zeroizing::new(*secret);
        Self::from_signing_key(SigningKey::from_bytes(&secret))
    }

    fn from_signing_key(secret: SigningKey) -> Self {
        let verifying_key = secret.verifying_key();
        Self {
            secret,
            verifying_key,
        }
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message)
    }

    /// The ledger address controlled by this key.
    pub fn address_bytes(&self) -> [u8; ADDRESS_LEN] {
        derive_address_bytes(&self.verifying_key)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &hex::encode(self.address_bytes()))
            .finish_non_exhaustive()
    }
}

/// Parse a 32-byte compressed public key.
pub fn parse_verifying_key(bytes: &[u8; 32]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(bytes)
        .map_err(|e| CryptoError::InvalidInput(format!("ed25519 public key: {e}")))
}

/// Verify `signature` over `message`, rejecting weak keys and malleable
/// signatures.
pub fn verify(public_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    public_key
        .verify_strict(message, signature)
        .map_err(|_| CryptoError::SignatureVerification)
}

/// `address = BLAKE3::hash(public_key)[12..32]`
pub fn derive_address_bytes(public_key: &VerifyingKey) -> [u8; ADDRESS_LEN] {
    let digest = crate::blake3::hash(public_key.as_bytes());
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
    address
}
