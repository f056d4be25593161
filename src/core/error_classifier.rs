//! Failure classification for wallet and RPC errors.
//!
//! `is_user_rejection` decides whether a failed step ends quietly (the user
//! declined in the wallet) or propagates as a hard failure. `format_error_for_user`
//! turns raw wallet/RPC error text into something a person can act on; it is
//! what ends up in a transaction record's `error_details`.

use crate::core::errors::ProviderError;
use ethers::types::U256;
use once_cell::sync::Lazy;
use regex::Regex;

const REJECTION_VOCABULARY: &[&str] = &[
    "rejected",
    "denied",
    "cancelled",
    "declined",
    "user rejected",
    "user denied",
];

const USER_REJECTED_REQUEST_ERROR: &str = "UserRejectedRequestError";
const TRANSACTION_EXECUTION_ERROR: &str = "TransactionExecutionError";

static DETAILS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Details:\s*([^\n]+)").expect("details regex is valid"));
static FUNDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)have\s+(\d+)\s+want\s+(\d+)").expect("funds regex is valid"));
static CHAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chain:\s*([^(]+)\(id:\s*(\d+)\)").expect("chain regex is valid")
});
static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)value:\s*([\d.]+)\s*(\w+)").expect("value regex is valid"));

/// Returns true when the error means the user declined in their wallet.
pub fn is_user_rejection(error: &ProviderError) -> bool {
    let message = error.message.to_lowercase();

    if REJECTION_VOCABULARY.iter().any(|needle| message.contains(needle)) {
        return true;
    }
    if message.contains("signature") && message.contains("denied") {
        return true;
    }

    match error.name.as_deref() {
        Some(USER_REJECTED_REQUEST_ERROR) => true,
        Some(TRANSACTION_EXECUTION_ERROR) => message.contains("user rejected"),
        _ => false,
    }
}

/// Formats a wallet/RPC error for display.
pub fn format_error_for_user(error: &ProviderError) -> String {
    let message = error.message.as_str();
    let lower = message.to_lowercase();

    if lower.contains("blind signing") || lower.contains("contract data") {
        return "Your hardware wallet requires Blind Signing to be enabled for this transaction."
            .to_string();
    }

    let mentions_device =
        lower.contains("ledger") || lower.contains("trezor") || lower.contains("device");
    if mentions_device && (lower.contains("locked") || lower.contains("unlock")) {
        return "Your hardware wallet is locked. Please unlock it and try again.".to_string();
    }
    if lower.contains("device") && (lower.contains("disconnected") || lower.contains("not found")) {
        return "Hardware wallet disconnected. Please reconnect your device and try again."
            .to_string();
    }

    if lower.contains("insufficient")
        && (lower.contains("funds") || lower.contains("balance") || lower.contains("eth"))
    {
        if let Some(summary) = insufficient_funds_summary(message) {
            return summary;
        }
        if lower.contains("gas") || lower.contains("eth") {
            return "Insufficient ETH for gas fees. Please add ETH to your wallet and try again."
                .to_string();
        }
        return "Insufficient funds. Please check your balance and try with a smaller amount."
            .to_string();
    }

    if lower.contains("gas") || lower.contains("fee") {
        return "Insufficient ETH for gas fees. \
                Please add ETH to your Torus EVM wallet and try again."
            .to_string();
    }

    if lower.contains("network") || lower.contains("connection") || lower.contains("timeout") {
        return "Network connection issue. Please check your internet connection and try again."
            .to_string();
    }

    if is_user_rejection(error) {
        return "Transaction was rejected. Please try again when ready.".to_string();
    }

    if lower.contains("internal error") {
        if let Some(details) = extract_details(message) {
            return match extract_transaction_context(message) {
                Some(context) => format!("{}\n\nTransaction: {}", details, context),
                None => details,
            };
        }
    }

    if lower.contains("transactionexecutionerror") {
        if let Some(details) = extract_details(message) {
            return format!("Transaction failed: {}", details);
        }
    }

    if lower.contains("internalrpcerror") {
        if let Some(details) = extract_details(message) {
            return details;
        }
    }

    if message.len() > 200 {
        if let Some(details) = extract_details(message) {
            return details;
        }
        return message
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.contains("at ") && !line.contains('('))
            .map(str::to_string)
            .unwrap_or_else(|| {
                "Transaction failed. Please try again or contact support.".to_string()
            });
    }

    message.to_string()
}

fn extract_details(message: &str) -> Option<String> {
    DETAILS_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_transaction_context(message: &str) -> Option<String> {
    let chain = CHAIN_RE.captures(message)?.get(1)?.as_str().trim().to_string();
    let value = VALUE_RE.captures(message)?;
    let amount = value.get(1)?.as_str();
    let token = value.get(2).map(|m| m.as_str()).unwrap_or("TORUS");
    Some(format!("{} {} on {}", amount, token, chain))
}

fn insufficient_funds_summary(message: &str) -> Option<String> {
    let caps = FUNDS_RE.captures(message)?;
    let have = U256::from_dec_str(caps.get(1)?.as_str()).ok()?;
    let want = U256::from_dec_str(caps.get(2)?.as_str()).ok()?;
    let missing = want.saturating_sub(have);

    Some(format!(
        "Insufficient funds.\n\nYou have: {} ETH\nRequired: {} ETH\nMissing: {} ETH\n\n\
         Please add funds to your wallet.",
        wei_to_eth_display(have),
        wei_to_eth_display(want),
        wei_to_eth_display(missing)
    ))
}

/// Renders a wei amount with six decimals, truncating the rest.
fn wei_to_eth_display(wei: U256) -> String {
    let one_eth = U256::exp10(18);
    let micro = U256::exp10(12);
    let whole = wei / one_eth;
    let fraction = (wei % one_eth) / micro;
    format!("{}.{:06}", whole, fraction.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("User rejected the request." ; "wallet connect rejection")]
    #[test_case(
        "MetaMask Tx Signature: User denied transaction signature." ;
        "metamask signature denied"
    )]
    #[test_case("Request cancelled by the user" ; "cancelled")]
    #[test_case("The user DECLINED the prompt" ; "declined uppercase")]
    #[test_case("Signature request was denied" ; "signature denied")]
    fn rejection_messages_are_classified(message: &str) {
        assert!(is_user_rejection(&ProviderError::new(message)));
    }

    #[test_case("insufficient funds for gas * price + value" ; "insufficient funds")]
    #[test_case("execution reverted" ; "revert")]
    #[test_case("request timed out" ; "timeout")]
    fn failures_are_not_rejections(message: &str) {
        assert!(!is_user_rejection(&ProviderError::new(message)));
    }

    #[test]
    fn test_rejection_by_error_name() {
        let err = ProviderError::named("UserRejectedRequestError", "Something happened");
        assert!(is_user_rejection(&err));

        let exec = ProviderError::named("TransactionExecutionError", "reverted: out of bounds");
        assert!(!is_user_rejection(&exec));
    }

    #[test]
    fn test_insufficient_funds_breakdown() {
        let err = ProviderError::new(
            "insufficient funds for transfer: have 500000000000000000 want 1250000000000000000",
        );
        let formatted = format_error_for_user(&err);
        assert!(formatted.contains("You have: 0.500000 ETH"));
        assert!(formatted.contains("Required: 1.250000 ETH"));
        assert!(formatted.contains("Missing: 0.750000 ETH"));
    }

    #[test]
    fn test_hardware_wallet_messages() {
        let locked = ProviderError::new("Ledger device: locked (0x5515)");
        assert_eq!(
            format_error_for_user(&locked),
            "Your hardware wallet is locked. Please unlock it and try again."
        );
        let blind = ProviderError::new("Please enable Blind signing or Contract data in the app");
        assert!(format_error_for_user(&blind).contains("Blind Signing"));
    }

    #[test]
    fn test_internal_error_details_extraction() {
        let err = ProviderError::new(
            "An internal error was received.\n\nRequest Arguments:\n  \
             chain: Torus EVM (id: 21000)\n  value: 12.5 TORUS\n\n\
             Details: nonce too low\nVersion: viem@2",
        );
        assert_eq!(
            format_error_for_user(&err),
            "nonce too low\n\nTransaction: 12.5 TORUS on Torus EVM"
        );
    }

    #[test]
    fn test_short_message_passthrough() {
        let err = ProviderError::new("execution reverted");
        assert_eq!(format_error_for_user(&err), "execution reverted");
    }

    #[test]
    fn test_long_message_first_meaningful_line() {
        let mut message = String::from("Something odd happened upstream\n");
        message.push_str(&"    at frame (file.js:1:1)\n".repeat(10));
        assert_eq!(
            format_error_for_user(&ProviderError::new(message)),
            "Something odd happened upstream"
        );
    }
}
