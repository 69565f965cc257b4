//! Confidential collection command handlers.
//!
//! Every confidential call succeeds at the RPC level; failed preconditions
//! are only visible by decrypting the returned `error.mask`.

use serde_json::Value;

use super::{params, publish, to_json, Result};
use crate::DaemonState;

pub async fn name(state: &DaemonState) -> Result {
    let ledger = state.ledger.lock().await;
    Ok(Value::from(ledger.collection.name()))
}

pub async fn symbol(state: &DaemonState) -> Result {
    let ledger = state.ledger.lock().await;
    Ok(Value::from(ledger.collection.symbol()))
}

/// Contract addresses clients name in decryption grants.
pub async fn get_contracts(state: &DaemonState) -> Result {
    let ledger = state.ledger.lock().await;
    Ok(serde_json::json!({
        "collection": ledger.collection.address(),
        "lootbox": ledger.lootbox.address(),
    }))
}

pub async fn mint(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let to = params::address(params, "to")?;
    let asset_id = params::asset_id(params, "asset_id")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt = ledger
        .collection
        .mint(&mut ledger.provider, caller, to, asset_id);
    publish(state, ledger);
    to_json(&receipt?)
}

pub async fn transfer_from(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let from = params::address(params, "from")?;
    let to = params::address(params, "to")?;
    let asset_id = params::asset_id(params, "asset_id")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt = ledger
        .collection
        .transfer_from(&mut ledger.provider, caller, from, to, asset_id);
    publish(state, ledger);
    to_json(&receipt?)
}

pub async fn balance_of(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let account = params::address(params, "account")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt = ledger
        .collection
        .balance_of(&mut ledger.provider, caller, account);
    publish(state, ledger);
    to_json(&receipt?)
}

pub async fn owner_of(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let asset_id = params::asset_id(params, "asset_id")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt = ledger
        .collection
        .owner_of(&mut ledger.provider, caller, asset_id);
    publish(state, ledger);
    to_json(&receipt?)
}

pub async fn set_approval_for_all(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let operator = params::address(params, "operator")?;
    let approved = params::bool_param(params, "approved")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt =
        ledger
            .collection
            .set_approval_for_all(&mut ledger.provider, caller, operator, approved);
    publish(state, ledger);
    to_json(&receipt?)
}

pub async fn is_approved_for_all(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let owner = params::address(params, "owner")?;
    let operator = params::address(params, "operator")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let receipt =
        ledger
            .collection
            .is_approved_for_all(&mut ledger.provider, caller, owner, operator);
    publish(state, ledger);
    to_json(&receipt?)
}
