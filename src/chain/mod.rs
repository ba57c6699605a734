//! On-chain event types and the connection-managing monitor.

pub mod abi;
pub mod monitor;
pub mod scanner;

use alloy::primitives::{Address, B256, U256};
use std::collections::{HashSet, VecDeque};

/// A stake action observed on the contract.
#[derive(Debug, Clone)]
pub struct StakeEvent {
    pub user: Address,
    pub token_id: U256,
    pub epoch_start: U256,
    pub block_number: u64,
    pub block_timestamp: u64,
}

/// A token ownership change observed on the contract.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
    pub block_number: u64,
}

/// Signals emitted by the chain monitor.
#[derive(Debug, Clone)]
pub enum ChainSignal {
    Connected,
    Disconnected { reason: String },
    Staked(StakeEvent),
    Transferred(TransferEvent),
}

/// Dedup key for a delivered log: (topic0, tokenId, blockNumber).
pub type SeenKey = (B256, U256, u64);

/// Bounded set of recently delivered logs. Reconnects and poll overlaps can
/// redeliver the same log; handlers must see it only once.
#[derive(Debug)]
pub struct SeenCache {
    seen: HashSet<SeenKey>,
    order: VecDeque<SeenKey>,
    capacity: usize,
}

impl SeenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false when the key was already present. The oldest entry is
    /// evicted once the cache is at capacity.
    pub fn insert(&mut self, key: SeenKey) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(token: u64, block: u64) -> SeenKey {
        (B256::repeat_byte(0x01), U256::from(token), block)
    }

    #[test]
    fn test_seen_cache_dedups() {
        let mut cache = SeenCache::new(8);
        assert!(cache.insert(key(1, 100)));
        assert!(!cache.insert(key(1, 100)));
        // Same token in a different block is a different event
        assert!(cache.insert(key(1, 101)));
    }

    #[test]
    fn test_seen_cache_evicts_oldest() {
        let mut cache = SeenCache::new(2);
        assert!(cache.insert(key(1, 1)));
        assert!(cache.insert(key(2, 2)));
        assert!(cache.insert(key(3, 3))); // evicts (1, 1)
        assert!(cache.insert(key(1, 1)));
        assert!(!cache.insert(key(3, 3)));
    }
}
