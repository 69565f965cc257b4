//! Operator approval for all assets of an owner.
//!
//! Approvals are keyed by the plaintext `(owner, operator)` pair and hold an
//! encrypted boolean. Both parties may decrypt the stored flag.

use std::collections::HashMap;

use aether_fhe::{ConfidentialCompute, Ebool, Fhe};
use aether_types::Address;

use crate::error_channel::{ErrorBit, ObliviousErrorChannel};
use crate::events::{ObliviousApprovalForAll, Receipt};
use crate::{ConfidentialCollection, Result};

/// Encrypted approve-all flags per `(owner, operator)`.
#[derive(Debug, Default)]
pub struct ApprovalStore {
    approvals: HashMap<(Address, Address), Ebool>,
}

impl ApprovalStore {
    /// The stored flag, if the slot was ever written.
    pub fn get(&self, owner: &Address, operator: &Address) -> Option<Ebool> {
        self.approvals.get(&(*owner, *operator)).copied()
    }

    pub(crate) fn load(
        &self,
        fhe: &mut Fhe<'_>,
        owner: &Address,
        operator: &Address,
    ) -> Result<Ebool> {
        match self.get(owner, operator) {
            Some(flag) => Ok(flag),
            None => Ok(fhe.encrypt_bool(false)?),
        }
    }
}

impl ConfidentialCollection {
    /// Set or clear `operator`'s approval over every asset of `caller`.
    ///
    /// Mask bits: [`ErrorBit::ZeroAddress`] when `operator` is zero,
    /// [`ErrorBit::SelfApproval`] when `operator == caller`.
    pub fn set_approval_for_all(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<Receipt<ObliviousApprovalForAll>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let owner_enc = fhe.encrypt_address(caller)?;
        let operator_enc = fhe.encrypt_address(operator)?;

        let operator_is_zero = fhe.eq(operator_enc, zero)?;
        errors.raise(&mut fhe, operator_is_zero, ErrorBit::ZeroAddress)?;
        let is_self = fhe.eq(operator_enc, owner_enc)?;
        errors.raise(&mut fhe, is_self, ErrorBit::SelfApproval)?;

        let current = self.approvals.load(&mut fhe, &caller, &operator)?;
        let proposed = fhe.encrypt_bool(approved)?;
        let failed = errors.failed(&mut fhe)?;
        let flag = fhe.select(failed, current, proposed)?;
        self.share(&mut fhe, flag, &[caller, operator])?;
        self.approvals.approvals.insert((caller, operator), flag);

        self.share(&mut fhe, owner_enc, &[caller, operator])?;
        let error = errors.finalize();
        self.share(&mut fhe, error.mask, &[caller])?;

        let receipt = Receipt {
            result: ObliviousApprovalForAll {
                owner: owner_enc,
                operator,
                approved: flag,
            },
            error,
        };
        self.emit(&receipt)?;
        tracing::debug!(owner = %caller, %operator, "registry: approval evaluated");
        Ok(receipt)
    }

    /// Whether `operator` may move every asset of `owner`.
    ///
    /// Mask bits: [`ErrorBit::ZeroAddress`] when either argument is zero.
    pub fn is_approved_for_all(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        owner: Address,
        operator: Address,
    ) -> Result<Receipt<ObliviousApprovalForAll>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let owner_enc = fhe.encrypt_address(owner)?;
        let operator_enc = fhe.encrypt_address(operator)?;
        let owner_is_zero = fhe.eq(owner_enc, zero)?;
        let operator_is_zero = fhe.eq(operator_enc, zero)?;
        let either_zero = fhe.or(owner_is_zero, operator_is_zero)?;
        errors.raise(&mut fhe, either_zero, ErrorBit::ZeroAddress)?;

        let flag = self.approvals.load(&mut fhe, &owner, &operator)?;
        self.share(&mut fhe, flag, &[owner, operator])?;
        self.share(&mut fhe, owner_enc, &[caller])?;

        let error = errors.finalize();
        self.share(&mut fhe, error.mask, &[caller])?;
        let receipt = Receipt {
            result: ObliviousApprovalForAll {
                owner: owner_enc,
                operator,
                approved: flag,
            },
            error,
        };
        self.emit(&receipt)?;
        tracing::trace!(%owner, %operator, %caller, "registry: approval queried");
        Ok(receipt)
    }
}
