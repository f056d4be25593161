//! Block explorer links.

const BASE_EXPLORER: &str = "https://basescan.org";
const TORUS_EXPLORER: &str = "https://blockscout.torus.network";

/// Transaction URL on the explorer for `chain_name`. Unknown chains yield an
/// empty string.
pub fn get_explorer_url(tx_hash: &str, chain_name: &str) -> String {
    match chain_name.trim().to_ascii_lowercase().as_str() {
        "base" => format!("{}/tx/{}", BASE_EXPLORER, tx_hash),
        "torus evm" | "torus" => format!("{}/tx/{}", TORUS_EXPLORER, tx_hash),
        _ => String::new(),
    }
}

/// Like [`get_explorer_url`], `None` when the chain has no explorer.
pub fn explorer_url(tx_hash: &str, chain_name: &str) -> Option<String> {
    let url = get_explorer_url(tx_hash, chain_name);
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chains() {
        assert_eq!(get_explorer_url("0xabc", "Base"), "https://basescan.org/tx/0xabc");
        assert_eq!(
            get_explorer_url("0xabc", "Torus EVM"),
            "https://blockscout.torus.network/tx/0xabc"
        );
        assert_eq!(
            get_explorer_url("0xabc", "Torus"),
            "https://blockscout.torus.network/tx/0xabc"
        );
    }

    #[test]
    fn test_unknown_chain_is_empty() {
        assert_eq!(get_explorer_url("0xabc", "Native"), "");
        assert_eq!(explorer_url("0xabc", "Solana"), None);
    }
}
