use crate::core::errors::{BridgeError, Result};
use ethers::types::{Address, U256};
use ethers::utils::{parse_units, to_checksum};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

static HEX_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile")
});

/// Validates an EVM (H160) address. Mixed-case input must carry a valid
/// EIP-55 checksum; all-lower or all-upper is accepted as-is.
pub fn validate_evm_address(address: &str) -> Result<Address> {
    if !HEX_ADDRESS_RE.is_match(address) {
        return Err(BridgeError::InvalidInput(format!("Invalid EVM address: {}", address)));
    }
    let parsed = Address::from_str(address)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid EVM address: {}", e)))?;

    let body = &address[2..];
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if !is_all_lower && !is_all_upper && to_checksum(&parsed, None) != address {
        return Err(BridgeError::InvalidInput(
            "Invalid EIP-55 checksum for EVM address".to_string(),
        ));
    }
    Ok(parsed)
}

/// Strict decimal validator for amounts to avoid float parsing where exactness matters.
/// Accepts patterns like 123, 0.1, 1.234567 up to `max_decimals` decimals.
/// No leading '+', no exponent.
pub fn validate_amount_strict(amount: &str, max_decimals: u32) -> Result<()> {
    if amount.is_empty() {
        return Err(BridgeError::InvalidInput("Amount cannot be empty".into()));
    }
    let pattern = if max_decimals == 0 {
        r"^(?:0|[1-9]\d*)$".to_string()
    } else {
        format!(r"^(?:0|[1-9]\d*)(?:\.(\d{{1,{}}}))?$", max_decimals)
    };
    let re = Regex::new(&pattern)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid amount pattern: {}", e)))?;
    if !re.is_match(amount) {
        return Err(BridgeError::InvalidInput(format!("Invalid decimal amount: {}", amount)));
    }
    // disallow 0 or 0.0... values
    if amount.trim_matches('0').trim_matches('.').is_empty() {
        return Err(BridgeError::InvalidInput("Amount must be positive".into()));
    }
    Ok(())
}

/// Converts a user-entered decimal amount into smallest units.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256> {
    let amount = amount.trim();
    validate_amount_strict(amount, decimals)?;
    let units = parse_units(amount, decimals)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid amount {}: {}", amount, e)))?;
    Ok(U256::from(units))
}
