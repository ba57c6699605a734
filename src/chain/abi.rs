//! Event topic hashes for the staking contract.
//!
//! These are used in eth_subscribe / eth_getLogs filters to select only the
//! events we care about.

use alloy::primitives::{b256, keccak256, B256};
use std::sync::LazyLock;

/// keccak256("Transfer(address,address,uint256)"), the canonical ERC-721
/// transfer event.
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// keccak256("Staked(address,uint256,uint256)").
/// Computed at startup; the staking contract is not a standard interface so
/// there is no well-known constant to pin.
pub static STAKED_TOPIC: LazyLock<B256> =
    LazyLock::new(|| keccak256(b"Staked(address,uint256,uint256)"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_topic_matches_signature() {
        assert_eq!(TRANSFER_TOPIC, keccak256(b"Transfer(address,address,uint256)"));
    }

    #[test]
    fn test_topics_are_distinct() {
        assert_ne!(*STAKED_TOPIC, TRANSFER_TOPIC);
    }
}
