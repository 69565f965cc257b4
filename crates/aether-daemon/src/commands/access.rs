//! User decryption.
//!
//! The requester presents a signed grant; the provider checks the grant,
//! the contract binding and the handle's access list before revealing
//! anything.

use std::time::{SystemTime, UNIX_EPOCH};

use aether_crypto::ed25519::{self, Signature};
use aether_fhe::{ConfidentialCompute, DecryptRequest, DecryptionGrant};
use aether_types::{parse_fixed_hex, Address};
use serde_json::Value;

use super::{params, to_json, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Decrypt `handle` produced by `contract` for the holder of `grant`.
///
/// `grant` fields: `public_key` (32-byte hex), `contracts` (hex addresses),
/// `start_timestamp`, `duration_days`, `signature` (64-byte hex). `now`
/// defaults to the daemon clock.
pub async fn user_decrypt(state: &DaemonState, params: &Value) -> Result {
    let handle = params::handle(params, "handle")?;
    let contract = params::address(params, "contract")?;
    let grant = parse_grant(params::required(params, "grant")?)?;
    let now = match params::optional_u64(params, "now")? {
        Some(now) => now,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    };
    let requester = grant.requester();
    let request = DecryptRequest {
        contract,
        grant,
        now,
    };

    let ledger = state.ledger.lock().await;
    let plaintext = ledger.provider.user_decrypt(handle, &request).map_err(|e| {
        tracing::warn!(%requester, %contract, error = %e, "daemon: decryption refused");
        RpcError::from(e)
    })?;
    to_json(&plaintext)
}

fn parse_grant(value: &Value) -> std::result::Result<DecryptionGrant, RpcError> {
    let public_key = parse_fixed_hex::<32>(params::string(value, "public_key")?)
        .map_err(|e| RpcError::invalid_params(&format!("grant.public_key: {e}")))?;
    let public_key = ed25519::parse_verifying_key(&public_key)
        .map_err(|e| RpcError::invalid_params(&format!("grant.public_key: {e}")))?;
    let signature = parse_fixed_hex::<64>(params::string(value, "signature")?)
        .map_err(|e| RpcError::invalid_params(&format!("grant.signature: {e}")))?;

    let contracts = params::required(value, "contracts")?
        .as_array()
        .ok_or_else(|| RpcError::invalid_params("grant.contracts must be an array"))?
        .iter()
        .map(|c| {
            c.as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| RpcError::invalid_params("grant.contracts: invalid address"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(DecryptionGrant {
        public_key,
        contracts,
        start_timestamp: params::u64_param(value, "start_timestamp")?,
        duration_days: params::u64_param(value, "duration_days")?,
        signature: Signature::from_bytes(&signature),
    })
}

/// Encode a grant in the form `user_decrypt` accepts.
pub fn grant_to_json(grant: &DecryptionGrant) -> Value {
    serde_json::json!({
        "public_key": hex::encode(grant.public_key.to_bytes()),
        "contracts": grant.contracts.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "start_timestamp": grant.start_timestamp,
        "duration_days": grant.duration_days,
        "signature": hex::encode(grant.signature.to_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_crypto::ed25519::KeyPair;

    #[test]
    fn test_grant_json_roundtrip() {
        let keys = KeyPair::from_bytes(&[5u8; 32]);
        let grant = DecryptionGrant::sign(&keys, vec![Address([9; 20])], 1_000, 30);
        let parsed = parse_grant(&grant_to_json(&grant)).expect("parse");
        assert_eq!(parsed, grant);
        assert!(parsed.verify(1_000, 365).is_ok());
    }

    #[test]
    fn test_grant_rejects_bad_key() {
        let mut json = grant_to_json(&DecryptionGrant::sign(
            &KeyPair::from_bytes(&[5u8; 32]),
            Vec::new(),
            0,
            1,
        ));
        json["public_key"] = Value::from("abcd");
        let err = parse_grant(&json).expect_err("short key");
        assert_eq!(err.code, -32602);
    }
}
