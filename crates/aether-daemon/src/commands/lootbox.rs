//! Loot box command handlers.
//!
//! These are plaintext calls: a failure is returned as an RPC error and
//! leaves the loot box unchanged, except `loot` on an exhausted blueprint,
//! which consumes the ticket.

use serde_json::Value;

use super::{params, publish, to_json, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

pub async fn add_tier(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let name = params::string(params, "name")?;
    let weight = params::u64_param(params, "weight")?;
    let mask = params::optional_u64(params, "mask")?
        .map(|m| u32::try_from(m).map_err(|_| RpcError::invalid_params("mask must fit in 32 bits")))
        .transpose()?;

    let mut ledger = state.ledger.lock().await;
    let mask = ledger.lootbox.add_tier(caller, name, mask, weight)?;
    publish(state, &mut ledger);
    Ok(serde_json::json!({ "mask": mask }))
}

pub async fn add_blueprint(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let tier_weight = params::u64_param(params, "tier_weight")?;
    let name = params::string(params, "name")?;
    let max_supply = params::u64_param(params, "max_supply")?;

    let mut ledger = state.ledger.lock().await;
    let index = ledger
        .lootbox
        .add_blueprint(caller, tier_weight, name, max_supply)?;
    publish(state, &mut ledger);
    Ok(serde_json::json!({ "index": index }))
}

/// Every tier with its blueprints and issued counts.
pub async fn get_tiers(state: &DaemonState) -> Result {
    let ledger = state.ledger.lock().await;
    to_json(&ledger.lootbox.tiers())
}

pub async fn get_tier_blueprint_count(state: &DaemonState, params: &Value) -> Result {
    let tier_weight = params::u64_param(params, "tier_weight")?;
    let ledger = state.ledger.lock().await;
    Ok(Value::from(ledger.lootbox.get_tier_blueprint_count(tier_weight)?))
}

pub async fn get_blueprint_max_supply(state: &DaemonState, params: &Value) -> Result {
    let (tier_weight, index) = blueprint_key(params)?;
    let ledger = state.ledger.lock().await;
    Ok(Value::from(
        ledger.lootbox.get_blueprint_max_supply(tier_weight, index)?,
    ))
}

pub async fn get_blueprint_issued(state: &DaemonState, params: &Value) -> Result {
    let (tier_weight, index) = blueprint_key(params)?;
    let ledger = state.ledger.lock().await;
    Ok(Value::from(
        ledger.lootbox.get_blueprint_issued(tier_weight, index)?,
    ))
}

pub async fn buy_ticket(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let label = params::string(params, "label")?;
    let amount = u32::try_from(params::u64_param(params, "amount")?)
        .map_err(|_| RpcError::invalid_params("amount must fit in 32 bits"))?;
    let payment = params::u128_param(params, "payment")?;

    let mut ledger = state.ledger.lock().await;
    let purchase = ledger
        .lootbox
        .buy_ticket(caller, label.as_bytes(), amount, payment)?;
    publish(state, &mut ledger);
    to_json(&purchase)
}

pub async fn pop_ticket(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let mut ledger = state.ledger.lock().await;
    let ticket = ledger.lootbox.pop_ticket(caller)?;
    publish(state, &mut ledger);
    to_json(&ticket)
}

pub async fn refund_ticket(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let mut ledger = state.ledger.lock().await;
    let refund = ledger.lootbox.refund_ticket(caller)?;
    publish(state, &mut ledger);
    Ok(serde_json::json!({ "refund": refund.to_string() }))
}

pub async fn pending_tickets(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let ledger = state.ledger.lock().await;
    Ok(Value::from(ledger.lootbox.pending_tickets(&caller)))
}

pub async fn loot(state: &DaemonState, params: &Value) -> Result {
    let caller = params::caller(params)?;
    let seed = params::string(params, "seed")?;

    let mut guard = state.ledger.lock().await;
    let ledger = &mut *guard;
    let outcome = ledger
        .lootbox
        .loot(&mut ledger.provider, caller, seed.as_bytes());
    // A capacity failure still consumed the ticket.
    publish(state, ledger);
    to_json(&outcome?)
}

fn blueprint_key(params: &Value) -> std::result::Result<(u64, usize), RpcError> {
    let tier_weight = params::u64_param(params, "tier_weight")?;
    let index = usize::try_from(params::u64_param(params, "index")?)
        .map_err(|_| RpcError::invalid_params("index out of range"))?;
    Ok((tier_weight, index))
}
