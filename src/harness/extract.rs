//! Transaction identifier extraction from client output
//!
//! The client prints `交易哈希: <hash>` after broadcasting. Both extractors are
//! pure and total: absence of a hash is `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Label the client prints in front of a transaction hash
pub const HASH_LABEL: &str = "交易哈希:";

static BARE_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"交易哈希:\s*([a-fA-F0-9]{64})").expect("bare hash pattern"));

static PREFIXED_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"交易哈希:\s*(0x[a-fA-F0-9]{64})").expect("prefixed hash pattern"));

/// Tron: the first labelled 64-hex id, no prefix
pub fn tron_tx_hash(output: &str) -> Option<String> {
    BARE_HASH
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// EVM: the first labelled `0x` hash, falling back to a bare 64-hex id with `0x` added
pub fn evm_tx_hash(output: &str) -> Option<String> {
    if let Some(caps) = PREFIXED_HASH.captures(output) {
        return Some(caps[1].to_string());
    }
    tron_tx_hash(output).map(|hex| format!("0x{}", hex))
}
