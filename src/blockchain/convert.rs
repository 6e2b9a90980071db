//! Address and unit conversion helpers.
//!
//! Human amounts go through `rust_decimal` so "1.5" USDC never touches
//! floating point on its way to base units; base-unit values come back as
//! exact decimal strings built by inserting the point into the integer
//! representation.

use std::str::FromStr;

use ethers_core::types::{Address, U256};
use ethers_core::utils::to_checksum;
use rust_decimal::Decimal;

use crate::blockchain::models::ToolError;

pub const ETH_DECIMALS: u32 = 18;
pub const SOL_DECIMALS: u32 = 9;

// --- Address helpers ---

/// True for a 0x-prefixed 40-hex-digit string.
pub fn is_eth_address(address: &str) -> bool {
    let Some(body) = address.strip_prefix("0x") else {
        return false;
    };
    body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse and EIP-55 checksum an Ethereum address.
pub fn checksum_eth_address(address: &str) -> Result<String, ToolError> {
    if !is_eth_address(address) {
        return Err(ToolError::invalid(
            "address",
            format!("'{}' is not a valid Ethereum address", address),
        ));
    }
    let parsed = Address::from_str(address)
        .map_err(|e| ToolError::invalid("address", e.to_string()))?;
    Ok(to_checksum(&parsed, None))
}

/// True for a base58 string decoding to a 32-byte Solana public key.
pub fn is_sol_address(address: &str) -> bool {
    match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}

// --- Unit conversions ---

/// Convert a human-readable amount ("1.5") into base units (10^decimals).
/// Sub-unit dust beyond `decimals` places is rejected rather than truncated.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256, ToolError> {
    let dec = Decimal::from_str(amount)
        .map_err(|e| ToolError::invalid("amount", format!("'{}': {}", amount, e)))?;
    if dec.is_sign_negative() {
        return Err(ToolError::invalid("amount", "amount must not be negative"));
    }
    let scale = Decimal::from_i128_with_scale(10i128.pow(decimals.min(28)), 0);
    let scaled = dec
        .checked_mul(scale)
        .ok_or_else(|| ToolError::invalid("amount", "amount too large"))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(ToolError::invalid(
            "amount",
            format!("more than {} decimal places", decimals),
        ));
    }
    U256::from_dec_str(&scaled.trunc().normalize().to_string())
        .map_err(|e| ToolError::invalid("amount", e.to_string()))
}

/// Render a base-unit value as a decimal string, exact at any magnitude.
pub fn from_base_units(raw: U256, decimals: u32) -> String {
    let digits = raw.to_string();
    if decimals == 0 {
        return digits;
    }
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

pub fn wei_to_eth(wei: U256) -> String {
    from_base_units(wei, ETH_DECIMALS)
}

pub fn eth_to_wei(amount: &str) -> Result<U256, ToolError> {
    to_base_units(amount, ETH_DECIMALS)
}

pub fn lamports_to_sol(lamports: u64) -> String {
    from_base_units(U256::from(lamports), SOL_DECIMALS)
}

pub fn sol_to_lamports(amount: &str) -> Result<u64, ToolError> {
    let raw = to_base_units(amount, SOL_DECIMALS)?;
    if raw > U256::from(u64::MAX) {
        return Err(ToolError::invalid("amount", "amount exceeds u64 lamports"));
    }
    Ok(raw.as_u64())
}

/// Numeric rendering for envelopes that expose a float `balance` field.
/// Precision-losing by nature; the exact string rides alongside it.
pub fn to_f64(amount: &str) -> f64 {
    amount.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_address_validation() {
        assert!(is_eth_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_eth_address("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_eth_address("0x123"));
        assert!(!is_eth_address("0xZZdA6BF26964aF9D7eEd9e03E53415D37aA96045"));
    }

    #[test]
    fn checksum_matches_known_vector() {
        let got = checksum_eth_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        assert_eq!(got, "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    }

    #[test]
    fn sol_address_validation() {
        // The system program id decodes to 32 zero bytes.
        assert!(is_sol_address("11111111111111111111111111111111"));
        assert!(!is_sol_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_sol_address("not-base58-0OIl"));
    }

    #[test]
    fn eth_round_trip() {
        let wei = eth_to_wei("1.5").unwrap();
        assert_eq!(wei, U256::from_dec_str("1500000000000000000").unwrap());
        assert_eq!(wei_to_eth(wei), "1.5");
    }

    #[test]
    fn token_units_round_trip_with_six_decimals() {
        let raw = to_base_units("123.456789", 6).unwrap();
        assert_eq!(raw, U256::from(123_456_789u64));
        assert_eq!(from_base_units(raw, 6), "123.456789");
    }

    #[test]
    fn lamports_round_trip() {
        let lamports = sol_to_lamports("2.000000001").unwrap();
        assert_eq!(lamports, 2_000_000_001);
        assert_eq!(lamports_to_sol(lamports), "2.000000001");
    }

    #[test]
    fn sub_unit_dust_is_rejected() {
        assert!(to_base_units("0.0000001", 6).is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(eth_to_wei("-1").is_err());
    }

    #[test]
    fn fractional_values_below_one() {
        assert_eq!(from_base_units(U256::from(42u64), 9), "0.000000042");
    }
}
