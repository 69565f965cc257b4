//! Confidential ownership: mint, transfer, and queries.
//!
//! Asset owners and account balances are stored only as handles. Unset
//! storage reads as a fresh encryption of zero, so every call reads and
//! writes the same slots regardless of prior state.
//!
//! Access: a stored owner handle is decryptable by the contract only. Owner
//! queries return `select(owner == caller, owner, 0)`, so a caller can learn
//! that they own an asset but never who else does. A balance handle is
//! decryptable by its account.

use std::collections::HashMap;

use aether_fhe::{ConfidentialCompute, Eaddress, Ebool, Encrypted, Euint64, Fhe};
use aether_types::{Address, AssetId};

use crate::error_channel::{ErrorBit, ObliviousErrorChannel};
use crate::events::{BalanceResult, ObliviousTransfer, OwnerResult, Receipt};
use crate::{ConfidentialCollection, Result};

/// Encrypted owners per asset and encrypted balances per account.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    owners: HashMap<AssetId, Eaddress>,
    balances: HashMap<Address, Euint64>,
}

impl OwnershipRegistry {
    /// The stored owner handle of an asset, if its slot was ever written.
    pub fn owner_handle(&self, asset_id: &AssetId) -> Option<Eaddress> {
        self.owners.get(asset_id).copied()
    }

    /// The stored balance handle of an account, if its slot was ever written.
    pub fn balance_handle(&self, account: &Address) -> Option<Euint64> {
        self.balances.get(account).copied()
    }

    fn load_owner(&self, fhe: &mut Fhe<'_>, asset_id: &AssetId) -> Result<Eaddress> {
        match self.owners.get(asset_id) {
            Some(owner) => Ok(*owner),
            None => Ok(fhe.encrypt_address(Address::ZERO)?),
        }
    }

    fn load_balance(&self, fhe: &mut Fhe<'_>, account: &Address) -> Result<Euint64> {
        match self.balances.get(account) {
            Some(balance) => Ok(*balance),
            None => Ok(fhe.encrypt_u64(0)?),
        }
    }
}

impl ConfidentialCollection {
    /// Mint `asset_id` to `to`.
    ///
    /// Mask bits: [`ErrorBit::ZeroAddress`] when `to` is zero,
    /// [`ErrorBit::AlreadyMinted`] when the asset already has an owner.
    pub fn mint(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        to: Address,
        asset_id: AssetId,
    ) -> Result<Receipt<ObliviousTransfer>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let to_enc = fhe.encrypt_address(to)?;
        let id_enc = fhe.encrypt_u256(asset_id)?;

        let to_is_zero = fhe.eq(to_enc, zero)?;
        errors.raise(&mut fhe, to_is_zero, ErrorBit::ZeroAddress)?;

        let current = self.ownership.load_owner(&mut fhe, &asset_id)?;
        let minted = fhe.ne(current, zero)?;
        errors.raise(&mut fhe, minted, ErrorBit::AlreadyMinted)?;

        let failed = errors.failed(&mut fhe)?;
        let owner = fhe.select(failed, current, to_enc)?;
        self.share(&mut fhe, owner, &[])?;
        self.ownership.owners.insert(asset_id, owner);

        self.credit(&mut fhe, failed, to)?;

        let result = ObliviousTransfer {
            from: zero,
            to: to_enc,
            asset_id: id_enc,
        };
        let receipt = self.finish_transfer(&mut fhe, result, errors, caller, &[to])?;
        tracing::debug!(%asset_id, %to, mask = ?receipt.error.mask.handle(), "registry: mint evaluated");
        Ok(receipt)
    }

    /// Move `asset_id` from `from` to `to` on behalf of `caller`.
    ///
    /// Mask bits: [`ErrorBit::ZeroAddress`] when `to` is zero,
    /// [`ErrorBit::NonexistentAsset`] when the asset was never minted,
    /// [`ErrorBit::IncorrectOwner`] when `from` is not the owner, and
    /// [`ErrorBit::Unauthorized`] when `caller` is neither the owner nor an
    /// operator approved by `from`.
    pub fn transfer_from(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        from: Address,
        to: Address,
        asset_id: AssetId,
    ) -> Result<Receipt<ObliviousTransfer>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let from_enc = fhe.encrypt_address(from)?;
        let to_enc = fhe.encrypt_address(to)?;
        let caller_enc = fhe.encrypt_address(caller)?;
        let id_enc = fhe.encrypt_u256(asset_id)?;

        let to_is_zero = fhe.eq(to_enc, zero)?;
        errors.raise(&mut fhe, to_is_zero, ErrorBit::ZeroAddress)?;

        let owner = self.ownership.load_owner(&mut fhe, &asset_id)?;
        let unminted = fhe.eq(owner, zero)?;
        errors.raise(&mut fhe, unminted, ErrorBit::NonexistentAsset)?;

        let from_is_owner = fhe.eq(owner, from_enc)?;
        let wrong_owner = fhe.not(from_is_owner)?;
        errors.raise(&mut fhe, wrong_owner, ErrorBit::IncorrectOwner)?;

        let caller_is_owner = fhe.eq(caller_enc, owner)?;
        let approved = self.approvals.load(&mut fhe, &from, &caller)?;
        let authorized = fhe.or(caller_is_owner, approved)?;
        let unauthorized = fhe.not(authorized)?;
        errors.raise(&mut fhe, unauthorized, ErrorBit::Unauthorized)?;

        let failed = errors.failed(&mut fhe)?;
        let new_owner = fhe.select(failed, owner, to_enc)?;
        self.share(&mut fhe, new_owner, &[])?;
        self.ownership.owners.insert(asset_id, new_owner);

        // Debit before credit: a self-transfer reads the debited balance back.
        self.debit(&mut fhe, failed, from)?;
        self.credit(&mut fhe, failed, to)?;

        let result = ObliviousTransfer {
            from: from_enc,
            to: to_enc,
            asset_id: id_enc,
        };
        let receipt = self.finish_transfer(&mut fhe, result, errors, caller, &[from, to])?;
        tracing::debug!(%asset_id, %from, %to, %caller, "registry: transfer evaluated");
        Ok(receipt)
    }

    /// The encrypted balance of `account`.
    ///
    /// Mask bits: [`ErrorBit::ZeroAddress`] when `account` is zero.
    pub fn balance_of(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        account: Address,
    ) -> Result<Receipt<BalanceResult>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let account_enc = fhe.encrypt_address(account)?;
        let is_zero = fhe.eq(account_enc, zero)?;
        errors.raise(&mut fhe, is_zero, ErrorBit::ZeroAddress)?;

        let balance = self.ownership.load_balance(&mut fhe, &account)?;
        self.share(&mut fhe, balance, &[account])?;

        let error = errors.finalize();
        self.share(&mut fhe, error.mask, &[caller])?;
        let receipt = Receipt {
            result: BalanceResult { balance },
            error,
        };
        self.emit(&receipt)?;
        tracing::trace!(%account, %caller, "registry: balance queried");
        Ok(receipt)
    }

    /// The encrypted owner of `asset_id`, as visible to `caller`.
    ///
    /// Mask bits: [`ErrorBit::NonexistentAsset`] when the asset was never
    /// minted.
    pub fn owner_of(
        &mut self,
        provider: &mut dyn ConfidentialCompute,
        caller: Address,
        asset_id: AssetId,
    ) -> Result<Receipt<OwnerResult>> {
        let mut fhe = Fhe::new(provider);
        let mut errors = ObliviousErrorChannel::open(&mut fhe)?;

        let zero = fhe.encrypt_address(Address::ZERO)?;
        let caller_enc = fhe.encrypt_address(caller)?;
        let owner = self.ownership.load_owner(&mut fhe, &asset_id)?;
        let unminted = fhe.eq(owner, zero)?;
        errors.raise(&mut fhe, unminted, ErrorBit::NonexistentAsset)?;

        let is_caller = fhe.eq(owner, caller_enc)?;
        let visible = fhe.select(is_caller, owner, zero)?;
        self.share(&mut fhe, visible, &[caller])?;

        let error = errors.finalize();
        self.share(&mut fhe, error.mask, &[caller])?;
        let receipt = Receipt {
            result: OwnerResult { owner: visible },
            error,
        };
        self.emit(&receipt)?;
        tracing::trace!(%asset_id, %caller, "registry: owner queried");
        Ok(receipt)
    }

    fn credit(&mut self, fhe: &mut Fhe<'_>, failed: Ebool, account: Address) -> Result<()> {
        let balance = self.ownership.load_balance(fhe, &account)?;
        let one = fhe.encrypt_u64(1)?;
        let raised = fhe.add_saturating(balance, one)?;
        let updated = fhe.select(failed, balance, raised)?;
        self.share(fhe, updated, &[account])?;
        self.ownership.balances.insert(account, updated);
        Ok(())
    }

    fn debit(&mut self, fhe: &mut Fhe<'_>, failed: Ebool, account: Address) -> Result<()> {
        let balance = self.ownership.load_balance(fhe, &account)?;
        let one = fhe.encrypt_u64(1)?;
        let lowered = fhe.sub_saturating(balance, one)?;
        let updated = fhe.select(failed, balance, lowered)?;
        self.share(fhe, updated, &[account])?;
        self.ownership.balances.insert(account, updated);
        Ok(())
    }

    fn finish_transfer(
        &mut self,
        fhe: &mut Fhe<'_>,
        result: ObliviousTransfer,
        errors: ObliviousErrorChannel,
        caller: Address,
        parties: &[Address],
    ) -> Result<Receipt<ObliviousTransfer>> {
        let mut viewers = parties.to_vec();
        viewers.push(caller);
        self.share(fhe, result.from, &viewers)?;
        self.share(fhe, result.to, &viewers)?;
        self.share(fhe, result.asset_id, &viewers)?;

        let error = errors.finalize();
        self.share(fhe, error.mask, &[caller])?;
        let receipt = Receipt { result, error };
        self.emit(&receipt)?;
        Ok(receipt)
    }
}
