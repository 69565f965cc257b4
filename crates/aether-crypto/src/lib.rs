//! # aether-crypto
//!
//! Cryptographic building blocks for the Aether confidential ledger.
//!
//! The ledger core never touches these directly for its confidential
//! arithmetic; they back the in-process confidential-compute provider
//! (ciphertext sealing), the user-decryption grants (signatures), and the
//! deterministic derivations used by loot resolution (hashing).
//!
//! ## Modules
//!
//! - [`blake3`] — Domain-separated BLAKE3 hashing and key derivation
//! - [`aead`] — ChaCha20-Poly1305 sealing of ciphertext words
//! - [`ed25519`] — Ed25519 signing keys and address derivation

pub mod aead;
pub mod blake3;
pub mod ed25519;

/// Failures surfaced by the primitives in this crate.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A grant signature did not verify under the presented key.
    #[error("bad ed25519 signature")]
    SignatureVerification,

    /// A sealed word failed to open: wrong key, nonce or tampered bytes.
    #[error("sealed word failed authentication")]
    AeadDecryption,

    #[error("key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("malformed {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
