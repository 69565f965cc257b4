//! In-process reference provider.
//!
//! Values are held as 32-byte big-endian words sealed with
//! ChaCha20-Poly1305 under the provider's network key. Each operation opens
//! its operands, computes over the full word with `subtle` primitives, and
//! seals the result under a freshly derived handle:
//!
//! ```text
//! handle = BLAKE3::derive_key("Aether v1 ciphertext-handle",
//!              LE32-framed(LE64(counter), op_tag, operand handles))[..30]
//!          || type_tag || version
//! ```
//!
//! Word operations run the same instruction sequence for every operand
//! value. Only public facts (types, widths, handle lookups) select a path.

use std::collections::{BTreeSet, HashMap};

use aether_crypto::{aead, blake3};
use aether_types::Address;
use rand::RngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroizing;

use crate::handle::{FheType, Handle, Plaintext};
use crate::provider::{BinaryOp, ConfidentialCompute, DecryptRequest};
use crate::{FheError, Result};

/// Operation tags for handle derivation of non-binary operations.
const TAG_TRIVIAL_ENCRYPT: u8 = 0x01;
const TAG_NOT: u8 = 0x40;
const TAG_SELECT: u8 = 0x50;

type Word = [u8; 32];

/// Configuration for [`InProcessProvider`].
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Sealing key. A random key is generated when `None`.
    pub network_key: Option<[u8; 32]>,
    /// Longest decryption grant the provider accepts.
    pub grant_max_duration_days: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            network_key: None,
            grant_max_duration_days: 365,
        }
    }
}

struct Entry {
    sealed: Vec<u8>,
    ty: FheType,
    acl: BTreeSet<Address>,
}

/// Reference confidential-compute provider running in the current process.
pub struct InProcessProvider {
    network_key: Zeroizing<[u8; aead::KEY_SIZE]>,
    counter: u64,
    entries: HashMap<Handle, Entry>,
    grant_max_duration_days: u64,
}

impl InProcessProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let key = match config.network_key {
            Some(key) => key,
            None => {
                let mut key = [0u8; aead::KEY_SIZE];
                rand::rngs::OsRng.fill_bytes(&mut key);
                key
            }
        };
        Self {
            network_key: Zeroizing::new(key),
            counter: 0,
            entries: HashMap::new(),
            grant_max_duration_days: config.grant_max_duration_days,
        }
    }

    /// Number of ciphertexts currently held.
    pub fn ciphertext_count(&self) -> usize {
        self.entries.len()
    }

    fn store(&mut self, op_tag: u8, operands: &[Handle], ty: FheType, word: &Word) -> Result<Handle> {
        self.counter += 1;
        let operand_bytes: Vec<u8> = operands
            .iter()
            .flat_map(|h| h.as_bytes().iter().copied())
            .collect();
        let input = blake3::encode_multi_field(&[
            &self.counter.to_le_bytes(),
            &[op_tag],
            &operand_bytes,
        ]);
        let digest = blake3::derive_key(blake3::contexts::CIPHERTEXT_HANDLE, &input);
        let handle = Handle::from_digest(&digest, ty);

        let sealed = aead::seal_word(&self.network_key, handle.as_bytes(), word, ty.tag())?;
        self.entries.insert(
            handle,
            Entry {
                sealed,
                ty,
                acl: BTreeSet::new(),
            },
        );
        Ok(handle)
    }

    fn open(&self, handle: Handle) -> Result<(FheType, Zeroizing<Word>)> {
        let entry = self
            .entries
            .get(&handle)
            .ok_or(FheError::UnknownHandle(handle))?;
        let word = aead::open_word(&self.network_key, handle.as_bytes(), &entry.sealed, entry.ty.tag())?;
        Ok((entry.ty, Zeroizing::new(word)))
    }

    /// Decrypt without a grant. Test-only.
    #[cfg(test)]
    pub(crate) fn reveal(&self, handle: Handle) -> Result<Plaintext> {
        let (ty, word) = self.open(handle)?;
        Ok(Plaintext::from_word(ty, &word))
    }
}

impl ConfidentialCompute for InProcessProvider {
    fn trivial_encrypt(&mut self, value: Plaintext) -> Result<Handle> {
        let word = Zeroizing::new(value.to_word());
        self.store(TAG_TRIVIAL_ENCRYPT, &[], value.fhe_type(), &word)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Handle, rhs: Handle) -> Result<Handle> {
        let (lhs_ty, a) = self.open(lhs)?;
        let (rhs_ty, b) = self.open(rhs)?;
        if lhs_ty != rhs_ty {
            return Err(FheError::TypeMismatch {
                expected: lhs_ty,
                actual: rhs_ty,
            });
        }
        check_supported(op, lhs_ty)?;

        let out = Zeroizing::new(match op {
            BinaryOp::Eq => choice_word(ct_eq(&a, &b)),
            BinaryOp::Ne => choice_word(!ct_eq(&a, &b)),
            BinaryOp::Lt => choice_word(ct_lt(&a, &b)),
            BinaryOp::Le => choice_word(ct_lt(&a, &b) | ct_eq(&a, &b)),
            BinaryOp::And => bytewise(&a, &b, |x, y| x & y),
            BinaryOp::Or => bytewise(&a, &b, |x, y| x | y),
            BinaryOp::Xor => bytewise(&a, &b, |x, y| x ^ y),
            BinaryOp::Add => truncate(wrapping_add(&a, &b), lhs_ty),
            BinaryOp::Sub => truncate(wrapping_sub(&a, &b), lhs_ty),
        });

        let handle = self.store(op.tag(), &[lhs, rhs], op.result_type(lhs_ty), &out)?;
        tracing::trace!(?op, ?lhs, ?rhs, result = ?handle, "fhe: binary");
        Ok(handle)
    }

    fn not(&mut self, operand: Handle) -> Result<Handle> {
        let (ty, word) = self.open(operand)?;
        let out = Zeroizing::new(match ty {
            FheType::Bool => {
                let mut out = *word;
                out[31] ^= 1;
                out
            }
            FheType::Uint8 | FheType::Uint64 | FheType::Uint256 => {
                truncate(bytewise(&word, &[0xFF; 32], |x, y| x ^ y), ty)
            }
            FheType::Address => {
                return Err(FheError::UnsupportedOperation { op: "not", ty });
            }
        });
        self.store(TAG_NOT, &[operand], ty, &out)
    }

    fn select(&mut self, cond: Handle, if_true: Handle, if_false: Handle) -> Result<Handle> {
        let (cond_ty, c) = self.open(cond)?;
        if cond_ty != FheType::Bool {
            return Err(FheError::TypeMismatch {
                expected: FheType::Bool,
                actual: cond_ty,
            });
        }
        let (ty, t) = self.open(if_true)?;
        let (false_ty, f) = self.open(if_false)?;
        if ty != false_ty {
            return Err(FheError::TypeMismatch {
                expected: ty,
                actual: false_ty,
            });
        }

        let choice = Choice::from(c[31] & 1);
        let mut out = Zeroizing::new([0u8; 32]);
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::conditional_select(&f[i], &t[i], choice);
        }
        self.store(TAG_SELECT, &[cond, if_true, if_false], ty, &out)
    }

    fn type_of(&self, handle: Handle) -> Result<FheType> {
        self.entries
            .get(&handle)
            .map(|entry| entry.ty)
            .ok_or(FheError::UnknownHandle(handle))
    }

    fn allow(&mut self, handle: Handle, account: Address) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(FheError::UnknownHandle(handle))?;
        entry.acl.insert(account);
        Ok(())
    }

    fn is_allowed(&self, handle: Handle, account: Address) -> bool {
        self.entries
            .get(&handle)
            .is_some_and(|entry| entry.acl.contains(&account))
    }

    fn user_decrypt(&self, handle: Handle, request: &DecryptRequest) -> Result<Plaintext> {
        let grant = &request.grant;
        grant.verify(request.now, self.grant_max_duration_days)?;
        if !grant.covers(&request.contract) {
            return Err(FheError::ContractNotGranted(request.contract));
        }

        let requester = grant.requester();
        for account in [requester, request.contract] {
            if !self.is_allowed(handle, account) {
                tracing::warn!(%handle, %account, "fhe: user decrypt denied");
                return Err(FheError::AccessDenied { handle, account });
            }
        }

        let (ty, word) = self.open(handle)?;
        tracing::debug!(%handle, %requester, "fhe: user decrypt");
        Ok(Plaintext::from_word(ty, &word))
    }
}

fn check_supported(op: BinaryOp, ty: FheType) -> Result<()> {
    let supported = match op {
        BinaryOp::Eq | BinaryOp::Ne => true,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Add | BinaryOp::Sub => ty.is_arithmetic(),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => ty != FheType::Address,
    };
    if supported {
        Ok(())
    } else {
        let op = match op {
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
        };
        Err(FheError::UnsupportedOperation { op, ty })
    }
}

fn ct_eq(a: &Word, b: &Word) -> Choice {
    a[..].ct_eq(&b[..])
}

/// Big-endian unsigned `a < b`.
fn ct_lt(a: &Word, b: &Word) -> Choice {
    let mut lt = Choice::from(0);
    let mut prefix_eq = Choice::from(1);
    for i in 0..32 {
        lt |= prefix_eq & a[i].ct_lt(&b[i]);
        prefix_eq &= a[i].ct_eq(&b[i]);
    }
    lt
}

fn choice_word(choice: Choice) -> Word {
    let mut out = [0u8; 32];
    out[31] = choice.unwrap_u8();
    out
}

fn bytewise(a: &Word, b: &Word, f: impl Fn(u8, u8) -> u8) -> Word {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = f(a[i], b[i]);
    }
    out
}

fn wrapping_add(a: &Word, b: &Word) -> Word {
    let mut out = [0u8; 32];
    let mut carry = 0u16;
    for i in (0..32).rev() {
        let sum = u16::from(a[i]) + u16::from(b[i]) + carry;
        out[i] = sum as u8;
        carry = sum >> 8;
    }
    out
}

fn wrapping_sub(a: &Word, b: &Word) -> Word {
    let mut out = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let diff = i16::from(a[i]) - i16::from(b[i]) - borrow;
        out[i] = diff as u8;
        borrow = (diff >> 8) & 1;
    }
    out
}

/// Clear every byte above the type's width.
fn truncate(mut word: Word, ty: FheType) -> Word {
    for byte in word.iter_mut().take(32 - ty.width_bytes()) {
        *byte = 0;
    }
    word
}
