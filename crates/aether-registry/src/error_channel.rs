//! Oblivious error signaling.
//!
//! A confidential call never aborts on a confidential predicate. Instead each
//! predicate is folded into an encrypted 8-bit mask:
//!
//! ```text
//! mask = mask | select(condition, 1 << bit, 0)
//! ```
//!
//! Every `raise` issues the same provider calls whether the condition holds
//! or not. State updates are gated on [`ObliviousErrorChannel::failed`], and
//! the accumulated mask is emitted with the call's result. A mask that
//! decrypts to zero is the only success signal.

use aether_fhe::{Ebool, Euint8, Fhe};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Failure predicates of the confidential ownership and approval path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBit {
    /// A recipient, operator, or queried account is the zero address.
    ZeroAddress = 0,
    /// Mint of an asset that already has an owner.
    AlreadyMinted = 1,
    /// The asset has never been minted.
    NonexistentAsset = 2,
    /// `from` is not the current owner.
    IncorrectOwner = 3,
    /// The caller is neither the owner nor an approved operator.
    Unauthorized = 4,
    /// An owner tried to approve themselves as operator.
    SelfApproval = 5,
}

impl ErrorBit {
    pub const ALL: [ErrorBit; 6] = [
        ErrorBit::ZeroAddress,
        ErrorBit::AlreadyMinted,
        ErrorBit::NonexistentAsset,
        ErrorBit::IncorrectOwner,
        ErrorBit::Unauthorized,
        ErrorBit::SelfApproval,
    ];

    /// Bit position in the mask.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// The single-bit mask for this predicate.
    pub fn mask(self) -> u8 {
        1 << self.index()
    }

    /// Decode every bit set in a decrypted mask.
    pub fn decode(mask: u8) -> Vec<ErrorBit> {
        Self::ALL
            .into_iter()
            .filter(|bit| mask & bit.mask() != 0)
            .collect()
    }
}

/// The encrypted error mask of one completed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObliviousError {
    pub mask: Euint8,
}

/// Per-call accumulator of encrypted failure bits.
pub struct ObliviousErrorChannel {
    mask: Euint8,
    clear: Euint8,
}

impl ObliviousErrorChannel {
    /// Start a call with an all-zero mask.
    pub fn open(fhe: &mut Fhe<'_>) -> Result<Self> {
        let clear = fhe.encrypt_u8(0)?;
        Ok(Self { mask: clear, clear })
    }

    /// Set `bit` in the mask when `condition` holds.
    ///
    /// Does not short-circuit: later predicates and updates still run.
    pub fn raise(&mut self, fhe: &mut Fhe<'_>, condition: Ebool, bit: ErrorBit) -> Result<()> {
        let flag = fhe.encrypt_u8(bit.mask())?;
        let contribution = fhe.select(condition, flag, self.clear)?;
        self.mask = fhe.or(self.mask, contribution)?;
        Ok(())
    }

    /// Encrypted "any bit set so far".
    pub fn failed(&self, fhe: &mut Fhe<'_>) -> Result<Ebool> {
        Ok(fhe.ne(self.mask, self.clear)?)
    }

    /// The accumulated mask, for emission.
    pub fn finalize(self) -> ObliviousError {
        ObliviousError { mask: self.mask }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{decrypt, Account};
    use aether_fhe::{Encrypted, InProcessProvider, Plaintext, ProviderConfig};
    use aether_types::Address;

    #[test]
    fn test_bit_layout() {
        assert_eq!(ErrorBit::ZeroAddress.mask(), 0b0000_0001);
        assert_eq!(ErrorBit::SelfApproval.mask(), 0b0010_0000);
        assert_eq!(
            ErrorBit::decode(0b0001_1000),
            vec![ErrorBit::IncorrectOwner, ErrorBit::Unauthorized]
        );
        assert!(ErrorBit::decode(0).is_empty());
    }

    #[test]
    fn test_raise_accumulates_without_short_circuit() {
        let contract = Address([0xC0; 20]);
        let viewer = Account::new();
        let mut provider = InProcessProvider::new(ProviderConfig::default());
        let (mask, failed, before) = {
            let mut fhe = Fhe::new(&mut provider);
            let mut errors = ObliviousErrorChannel::open(&mut fhe).expect("open");
            let yes = fhe.encrypt_bool(true).expect("encrypt");
            let no = fhe.encrypt_bool(false).expect("encrypt");

            errors.raise(&mut fhe, no, ErrorBit::ZeroAddress).expect("raise");
            let before = errors.failed(&mut fhe).expect("failed");
            errors.raise(&mut fhe, yes, ErrorBit::IncorrectOwner).expect("raise");
            errors.raise(&mut fhe, yes, ErrorBit::Unauthorized).expect("raise");
            let failed = errors.failed(&mut fhe).expect("failed");
            let mask = errors.finalize().mask;

            for account in [contract, viewer.address] {
                fhe.allow(mask, account).expect("allow");
                fhe.allow(failed, account).expect("allow");
                fhe.allow(before, account).expect("allow");
            }
            (mask, failed, before)
        };

        let read = |h| decrypt(&provider, contract, &viewer, h);
        assert_eq!(read(mask.handle()), Plaintext::Uint8(0b0001_1000));
        assert_eq!(read(failed.handle()), Plaintext::Bool(true));
        assert_eq!(read(before.handle()), Plaintext::Bool(false));
    }
}
