//! The confidential-compute provider interface.
//!
//! The ledger core is written against [`ConfidentialCompute`] only. A
//! provider owns every ciphertext; the core holds [`Handle`]s and asks the
//! provider to combine them. Every operation is total over values: it fails
//! only when the provider itself cannot compute (unknown handle, type
//! mismatch, corrupted storage), never because of what the operands hold.
//!
//! Decryption is not part of the core's vocabulary. [`ConfidentialCompute::user_decrypt`]
//! is the out-of-band channel used by account holders, gated by a signed
//! [`DecryptionGrant`](crate::grant::DecryptionGrant).

use aether_types::Address;
use serde::{Deserialize, Serialize};

use crate::grant::DecryptionGrant;
use crate::handle::{FheType, Handle, Plaintext};
use crate::Result;

/// Homomorphic binary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    And,
    Or,
    Xor,
    /// Wrapping addition at the operand width.
    Add,
    /// Wrapping subtraction at the operand width.
    Sub,
}

impl BinaryOp {
    /// Byte tag mixed into result handle derivation.
    pub fn tag(&self) -> u8 {
        match self {
            BinaryOp::Eq => 0x10,
            BinaryOp::Ne => 0x11,
            BinaryOp::Lt => 0x12,
            BinaryOp::Le => 0x13,
            BinaryOp::And => 0x20,
            BinaryOp::Or => 0x21,
            BinaryOp::Xor => 0x22,
            BinaryOp::Add => 0x30,
            BinaryOp::Sub => 0x31,
        }
    }

    /// Whether the result is an encrypted boolean regardless of operand type.
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le)
    }

    /// Result type for operands of type `operand`.
    pub fn result_type(&self, operand: FheType) -> FheType {
        if self.is_comparison() {
            FheType::Bool
        } else {
            operand
        }
    }
}

/// An out-of-band decryption request.
#[derive(Clone, Debug)]
pub struct DecryptRequest {
    /// The contract whose handle is being decrypted.
    pub contract: Address,
    /// The requester's signed, time-bounded authorization.
    pub grant: DecryptionGrant,
    /// Current Unix time in seconds, supplied by the caller's clock.
    pub now: u64,
}

/// A confidential-compute provider.
pub trait ConfidentialCompute {
    /// Encrypt a plaintext supplied in the clear by the caller.
    fn trivial_encrypt(&mut self, value: Plaintext) -> Result<Handle>;

    /// Apply a binary operation. Both operands must have the same type.
    fn binary(&mut self, op: BinaryOp, lhs: Handle, rhs: Handle) -> Result<Handle>;

    /// Logical negation for booleans, bitwise complement at width for integers.
    fn not(&mut self, operand: Handle) -> Result<Handle>;

    /// `cond ? if_true : if_false`, evaluated without revealing `cond`.
    fn select(&mut self, cond: Handle, if_true: Handle, if_false: Handle) -> Result<Handle>;

    /// The type of a stored ciphertext.
    fn type_of(&self, handle: Handle) -> Result<FheType>;

    /// Grant `account` the right to decrypt `handle`.
    fn allow(&mut self, handle: Handle, account: Address) -> Result<()>;

    /// Whether `account` may decrypt `handle`.
    fn is_allowed(&self, handle: Handle, account: Address) -> bool;

    /// Decrypt `handle` for the holder of `request.grant`.
    fn user_decrypt(&self, handle: Handle, request: &DecryptRequest) -> Result<Plaintext>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_result_type() {
        assert_eq!(BinaryOp::Lt.result_type(FheType::Uint64), FheType::Bool);
        assert_eq!(BinaryOp::Eq.result_type(FheType::Address), FheType::Bool);
        assert_eq!(BinaryOp::Add.result_type(FheType::Uint8), FheType::Uint8);
        assert_eq!(BinaryOp::Or.result_type(FheType::Bool), FheType::Bool);
    }

    #[test]
    fn test_op_tags_unique() {
        let ops = [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Xor,
            BinaryOp::Add,
            BinaryOp::Sub,
        ];
        let mut tags: Vec<u8> = ops.iter().map(BinaryOp::tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), ops.len());
    }
}
