//! # aether-fhe
//!
//! Confidential values for the Aether ledger.
//!
//! The ledger core manipulates encrypted values only through opaque
//! [`Handle`]s and the [`ConfidentialCompute`] provider trait. The typed
//! façade [`Fhe`] wraps a provider and exposes comparison, boolean,
//! arithmetic, and select operations over [`Ebool`], [`Euint8`],
//! [`Euint64`], [`Eaddress`], and [`Euint256`]. None of them reveal a
//! plaintext to the caller.
//!
//! ## Modules
//!
//! - [`handle`] — Handles, value types, plaintext words
//! - [`provider`] — The provider trait and decryption requests
//! - [`grant`] — Signed, time-bounded user-decryption grants
//! - [`values`] — Typed encrypted values
//! - [`ops`] — The typed operation façade
//! - [`in_process`] — Reference provider sealing words with ChaCha20-Poly1305

pub mod grant;
pub mod handle;
pub mod in_process;
pub mod ops;
pub mod provider;
pub mod values;

use aether_types::Address;

pub use grant::DecryptionGrant;
pub use handle::{FheType, Handle, Plaintext};
pub use in_process::{InProcessProvider, ProviderConfig};
pub use ops::Fhe;
pub use provider::{BinaryOp, ConfidentialCompute, DecryptRequest};
pub use values::{Eaddress, Ebool, Encrypted, Euint256, Euint64, Euint8};

/// Provider substrate failures.
///
/// None of these encode the outcome of a confidential predicate. They mean
/// the provider could not compute at all.
#[derive(Debug, thiserror::Error)]
pub enum FheError {
    /// The handle is not known to the provider.
    #[error("unknown handle {0}")]
    UnknownHandle(Handle),

    /// A handle carried an unrecognized type tag.
    #[error("unknown type tag {0:#04x}")]
    UnknownTypeTag(u8),

    /// Operand or requested view type did not match the stored type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: FheType, actual: FheType },

    /// The operation is not defined for the operand type.
    #[error("unsupported operation {op} on {ty}")]
    UnsupportedOperation { op: &'static str, ty: FheType },

    /// A sealed ciphertext failed to open or seal.
    #[error("sealing error: {0}")]
    Sealing(String),

    /// The account is not on the handle's access list.
    #[error("access denied: {account} may not decrypt {handle}")]
    AccessDenied { handle: Handle, account: Address },

    /// The grant signature did not verify.
    #[error("decryption grant signature invalid")]
    GrantSignature,

    /// The grant window has not opened yet.
    #[error("decryption grant not valid before {start} (now {now})")]
    GrantNotYetValid { start: u64, now: u64 },

    /// The grant window has closed.
    #[error("decryption grant expired at {expires_at} (now {now})")]
    GrantExpired { expires_at: u64, now: u64 },

    /// The grant duration exceeds the provider's limit.
    #[error("decryption grant lasts {days} days, limit is {max}")]
    GrantTooLong { days: u64, max: u64 },

    /// The grant does not name the contract being decrypted against.
    #[error("decryption grant does not cover contract {0}")]
    ContractNotGranted(Address),
}

impl From<aether_crypto::CryptoError> for FheError {
    fn from(err: aether_crypto::CryptoError) -> Self {
        FheError::Sealing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FheError>;
