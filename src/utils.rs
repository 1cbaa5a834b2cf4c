use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units, ParseUnits};
use std::str::FromStr;

use crate::constants::TOKEN_DECIMALS;
use crate::error::{AppError, Result};

/// Parse and lowercase an EVM address; rejects anything that is not
/// `0x` + 40 hex chars.
pub fn parse_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Address is required".to_string()));
    }
    Address::from_str(trimmed)
        .map_err(|_| AppError::BadRequest(format!("Invalid address: {}", trimmed)))
}

/// Canonical lowercase-hex form used as the key in every cache table.
pub fn address_key(address: &Address) -> String {
    format!("{:#x}", address)
}

/// Whole-token display amount, floored (the game UI never shows dust).
pub fn format_token_amount(amount: U256) -> String {
    let formatted = format_units(amount, TOKEN_DECIMALS).unwrap_or_else(|_| "0".to_string());
    formatted
        .split('.')
        .next()
        .unwrap_or("0")
        .to_string()
}

/// Token display amount with a fixed number of decimals.
pub fn format_token_amount_with_decimals(amount: U256, decimals: usize) -> String {
    let formatted = format_units(amount, TOKEN_DECIMALS).unwrap_or_else(|_| "0".to_string());
    let value: f64 = formatted.parse().unwrap_or(0.0);
    format!("{:.*}", decimals, value)
}

/// Parse a human token amount ("12.5") into wei.
pub fn parse_token_amount(amount: &str) -> Result<U256> {
    let parsed = parse_units(amount.trim(), TOKEN_DECIMALS)
        .map_err(|_| AppError::BadRequest(format!("Invalid token amount: {}", amount)))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(AppError::BadRequest(format!(
            "Invalid token amount: {}",
            amount
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(parse_address("").is_err());
        assert!(parse_address("0x123").is_err());
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn address_key_is_lowercase_hex() {
        let addr = parse_address("0xC447163802012BD45883fF7f203E7700e5Fa886C").unwrap();
        let key = address_key(&addr);
        assert_eq!(key, "0xc447163802012bd45883ff7f203e7700e5fa886c");
    }

    #[test]
    fn format_token_amount_floors() {
        let amount = parse_token_amount("12.9").unwrap();
        assert_eq!(format_token_amount(amount), "12");
    }

    #[test]
    fn format_with_decimals_rounds() {
        let amount = parse_token_amount("1.23456").unwrap();
        assert_eq!(format_token_amount_with_decimals(amount, 4), "1.2346");
    }

    #[test]
    fn parse_token_amount_round_trips_whole_tokens() {
        let amount = parse_token_amount("100").unwrap();
        assert_eq!(amount, U256::exp10(18) * U256::from(100u64));
    }
}
