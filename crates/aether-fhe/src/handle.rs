//! Ciphertext handles, value types, and plaintext words.
//!
//! A [`Handle`] is the only thing the ledger ever stores or emits for a
//! confidential value. Its layout is:
//!
//! ```text
//! bytes 0..30  BLAKE3 derivation over (op counter, op tag, operand handles)
//! byte  30     FheType tag
//! byte  31     handle version
//! ```
//!
//! Every plaintext is carried inside the provider as a 32-byte big-endian
//! word, zero-padded on the left, so that equality, ordering, and bitwise
//! operations can run over the same fixed-width representation for all
//! types.

use std::fmt;

use aether_types::{Address, AssetId};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{FheError, Result};

/// Current handle layout version.
pub const HANDLE_VERSION: u8 = 0x01;

/// An opaque reference to a ciphertext held by a confidential-compute provider.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; 32]);

impl Handle {
    /// Assemble a handle from a derivation digest and a value type.
    pub fn from_digest(digest: &[u8; 32], ty: FheType) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..30].copy_from_slice(&digest[..30]);
        bytes[30] = ty.tag();
        bytes[31] = HANDLE_VERSION;
        Self(bytes)
    }

    /// Raw handle bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The value type recorded in the handle, if the tag is known.
    pub fn declared_type(&self) -> Result<FheType> {
        FheType::from_tag(self.0[30])
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Abbreviated: handles are long and only the prefix matters in logs.
        write!(f, "Handle(0x{}..)", hex::encode(&self.0[..6]))
    }
}

/// The value type of a ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FheType {
    Bool,
    Uint8,
    Uint64,
    /// 160-bit account address.
    Address,
    Uint256,
}

impl FheType {
    /// Byte tag stored in handles and authenticated alongside sealed words.
    pub fn tag(&self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint64 => 5,
            FheType::Address => 7,
            FheType::Uint256 => 8,
        }
    }

    /// Inverse of [`FheType::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FheType::Bool),
            2 => Ok(FheType::Uint8),
            5 => Ok(FheType::Uint64),
            7 => Ok(FheType::Address),
            8 => Ok(FheType::Uint256),
            other => Err(FheError::UnknownTypeTag(other)),
        }
    }

    /// Number of significant low-order bytes in the 32-byte word.
    pub fn width_bytes(&self) -> usize {
        match self {
            FheType::Bool | FheType::Uint8 => 1,
            FheType::Uint64 => 8,
            FheType::Address => 20,
            FheType::Uint256 => 32,
        }
    }

    /// Whether wrapping arithmetic is defined for this type.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, FheType::Uint8 | FheType::Uint64 | FheType::Uint256)
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FheType::Bool => "ebool",
            FheType::Uint8 => "euint8",
            FheType::Uint64 => "euint64",
            FheType::Address => "eaddress",
            FheType::Uint256 => "euint256",
        };
        f.write_str(name)
    }
}

/// A decrypted (or to-be-encrypted) value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Plaintext {
    Bool(bool),
    Uint8(u8),
    Uint64(u64),
    Address(Address),
    Uint256(AssetId),
}

impl Plaintext {
    /// The value type of this plaintext.
    pub fn fhe_type(&self) -> FheType {
        match self {
            Plaintext::Bool(_) => FheType::Bool,
            Plaintext::Uint8(_) => FheType::Uint8,
            Plaintext::Uint64(_) => FheType::Uint64,
            Plaintext::Address(_) => FheType::Address,
            Plaintext::Uint256(_) => FheType::Uint256,
        }
    }

    /// Encode as a 32-byte big-endian word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Plaintext::Bool(b) => word[31] = u8::from(*b),
            Plaintext::Uint8(v) => word[31] = *v,
            Plaintext::Uint64(v) => word[24..].copy_from_slice(&v.to_be_bytes()),
            Plaintext::Address(a) => word = a.to_word(),
            Plaintext::Uint256(id) => word = *id.as_bytes(),
        }
        word
    }

    /// Decode a word produced for `ty`. Bytes above the type width are ignored.
    pub fn from_word(ty: FheType, word: &[u8; 32]) -> Self {
        match ty {
            FheType::Bool => Plaintext::Bool(word[31] & 1 == 1),
            FheType::Uint8 => Plaintext::Uint8(word[31]),
            FheType::Uint64 => {
                let mut be = [0u8; 8];
                be.copy_from_slice(&word[24..]);
                Plaintext::Uint64(u64::from_be_bytes(be))
            }
            FheType::Address => Plaintext::Address(Address::from_word(word)),
            FheType::Uint256 => Plaintext::Uint256(AssetId::from_bytes(*word)),
        }
    }

    /// The boolean value, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Plaintext::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer value, if this is a `Uint8` or `Uint64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Plaintext::Uint8(v) => Some(u64::from(*v)),
            Plaintext::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    /// The address, if this is an `Address`.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Plaintext::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// The 256-bit value, if this is a `Uint256`.
    pub fn as_asset_id(&self) -> Option<AssetId> {
        match self {
            Plaintext::Uint256(id) => Some(*id),
            _ => None,
        }
    }
}
