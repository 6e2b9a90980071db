//! Argument extraction helpers shared by every tool.

use serde_json::Value;

use crate::blockchain::models::ToolError;

/// Extract a required string argument or fail with an envelope-able error
/// naming the parameter.
pub fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ToolError> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ToolError::MissingParam(key)),
    }
}

/// Required argument that may be any JSON value (e.g. an ABI array).
pub fn required_value<'a>(args: &'a Value, key: &'static str) -> Result<&'a Value, ToolError> {
    match args.get(key) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(ToolError::MissingParam(key)),
    }
}

pub fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

pub fn opt_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

pub fn opt_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Network selector shared by the chain tools: defaults to Ethereum mainnet,
/// accepts the legacy `network_type` spelling for the environment.
pub fn network_params<'a>(args: &'a Value) -> (&'a str, &'a str) {
    let network = opt_str(args, "network").unwrap_or("ethereum");
    let environment = opt_str(args, "environment")
        .or_else(|| opt_str(args, "network_type"))
        .unwrap_or("mainnet");
    (network, environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_rejects_missing_null_and_empty() {
        let args = json!({"present": "x", "empty": "", "null": null});
        assert_eq!(required_str(&args, "present").unwrap(), "x");
        assert!(required_str(&args, "empty").is_err());
        assert!(required_str(&args, "null").is_err());
        assert!(required_str(&args, "absent").is_err());
    }

    #[test]
    fn network_params_default_to_ethereum_mainnet() {
        assert_eq!(network_params(&json!({})), ("ethereum", "mainnet"));
        assert_eq!(
            network_params(&json!({"network": "solana", "network_type": "devnet"})),
            ("solana", "devnet")
        );
        assert_eq!(
            network_params(&json!({"environment": "sepolia"})),
            ("ethereum", "sepolia")
        );
    }

    #[test]
    fn opt_u64_accepts_numeric_strings() {
        let args = json!({"gas": "21000", "nonce": 7});
        assert_eq!(opt_u64(&args, "gas"), Some(21000));
        assert_eq!(opt_u64(&args, "nonce"), Some(7));
        assert_eq!(opt_u64(&args, "missing"), None);
    }
}
