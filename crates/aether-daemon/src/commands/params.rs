//! Parameter extraction.
//!
//! Addresses, asset ids and handles are hex strings (`0x` optional). Asset
//! ids may also be plain numbers. Currency amounts are decimal strings or
//! numbers.

use aether_fhe::Handle;
use aether_types::{parse_fixed_hex, Address, AssetId};
use serde_json::Value;

use crate::rpc::RpcError;

type Result<T> = std::result::Result<T, RpcError>;

pub fn required<'a>(params: &'a Value, key: &str) -> Result<&'a Value> {
    params
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

pub fn string<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    required(params, key)?
        .as_str()
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a string")))
}

pub fn address(params: &Value, key: &str) -> Result<Address> {
    string(params, key)?
        .parse()
        .map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
}

/// The calling account. Transactions are unsigned; the caller is asserted.
pub fn caller(params: &Value) -> Result<Address> {
    address(params, "caller")
}

pub fn asset_id(params: &Value, key: &str) -> Result<AssetId> {
    let value = required(params, key)?;
    if let Some(n) = value.as_u64() {
        return Ok(AssetId::from(n));
    }
    value
        .as_str()
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be hex or a number")))?
        .parse()
        .map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
}

pub fn handle(params: &Value, key: &str) -> Result<Handle> {
    parse_fixed_hex::<32>(string(params, key)?)
        .map(Handle)
        .map_err(|e| RpcError::invalid_params(&format!("{key}: {e}")))
}

pub fn u64_param(params: &Value, key: &str) -> Result<u64> {
    let value = required(params, key)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be an unsigned integer")))
}

pub fn u128_param(params: &Value, key: &str) -> Result<u128> {
    let value = required(params, key)?;
    if let Some(n) = value.as_u64() {
        return Ok(u128::from(n));
    }
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be an unsigned integer")))
}

pub fn optional_u64(params: &Value, key: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => u64_param(params, key).map(Some),
    }
}

pub fn bool_param(params: &Value, key: &str) -> Result<bool> {
    required(params, key)?
        .as_bool()
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a boolean")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_forms() {
        let params = serde_json::json!({
            "n": 7,
            "h": hex::encode(AssetId::from(7u64).as_bytes()),
            "bad": true,
        });
        assert_eq!(asset_id(&params, "n").expect("number"), AssetId::from(7u64));
        assert_eq!(asset_id(&params, "h").expect("hex"), AssetId::from(7u64));
        assert!(asset_id(&params, "bad").is_err());
        assert!(asset_id(&params, "missing").is_err());
    }

    #[test]
    fn test_amounts() {
        let params = serde_json::json!({
            "small": 5,
            "big": "340282366920938463463374607431768211455",
            "neg": -1,
        });
        assert_eq!(u128_param(&params, "small").expect("small"), 5);
        assert_eq!(u128_param(&params, "big").expect("big"), u128::MAX);
        assert!(u128_param(&params, "neg").is_err());
        assert_eq!(optional_u64(&params, "absent").expect("absent"), None);
    }

    #[test]
    fn test_caller_required() {
        let err = caller(&serde_json::json!({})).expect_err("missing");
        assert_eq!(err.code, -32602);
        let ok = caller(&serde_json::json!({ "caller": Address([3; 20]).to_string() }));
        assert_eq!(ok.expect("caller"), Address([3; 20]));
    }
}
