//! Typed encrypted values.
//!
//! Each type is a thin, `Copy` wrapper over a [`Handle`] whose stored type
//! is known statically. Constructing one from a raw handle goes through
//! [`Fhe::view`](crate::ops::Fhe::view), which checks the provider's record.

use serde::{Deserialize, Serialize};

use crate::handle::{FheType, Handle, Plaintext};

/// A handle whose value type is known at compile time.
pub trait Encrypted: Copy {
    /// The provider-side type of the wrapped ciphertext.
    const TYPE: FheType;

    /// The wrapped handle.
    fn handle(&self) -> Handle;

    /// Wrap a handle without consulting the provider.
    ///
    /// Callers are responsible for the handle actually holding `Self::TYPE`.
    fn from_handle_unchecked(handle: Handle) -> Self;
}

/// Unsigned integer types with arithmetic defined.
pub trait EncryptedUint: Encrypted {
    /// The zero value of this width.
    fn zero() -> Plaintext;

    /// The largest value of this width.
    fn max() -> Plaintext;
}

macro_rules! encrypted_type {
    ($(#[$doc:meta])* $name:ident, $ty:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Handle);

        impl Encrypted for $name {
            const TYPE: FheType = $ty;

            fn handle(&self) -> Handle {
                self.0
            }

            fn from_handle_unchecked(handle: Handle) -> Self {
                Self(handle)
            }
        }

        impl From<$name> for Handle {
            fn from(value: $name) -> Handle {
                value.0
            }
        }
    };
}

encrypted_type!(
    /// An encrypted boolean.
    Ebool,
    FheType::Bool
);
encrypted_type!(
    /// An encrypted 8-bit unsigned integer. Used for error masks.
    Euint8,
    FheType::Uint8
);
encrypted_type!(
    /// An encrypted 64-bit unsigned integer. Used for balances.
    Euint64,
    FheType::Uint64
);
encrypted_type!(
    /// An encrypted 160-bit account address.
    Eaddress,
    FheType::Address
);
encrypted_type!(
    /// An encrypted 256-bit unsigned integer. Used for asset identifiers.
    Euint256,
    FheType::Uint256
);

impl EncryptedUint for Euint8 {
    fn zero() -> Plaintext {
        Plaintext::Uint8(0)
    }

    fn max() -> Plaintext {
        Plaintext::Uint8(u8::MAX)
    }
}

impl EncryptedUint for Euint64 {
    fn zero() -> Plaintext {
        Plaintext::Uint64(0)
    }

    fn max() -> Plaintext {
        Plaintext::Uint64(u64::MAX)
    }
}

impl EncryptedUint for Euint256 {
    fn zero() -> Plaintext {
        Plaintext::Uint256(aether_types::AssetId::from_bytes([0u8; 32]))
    }

    fn max() -> Plaintext {
        Plaintext::Uint256(aether_types::AssetId::from_bytes([0xFF; 32]))
    }
}
