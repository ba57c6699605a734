//! Leaderboard backfill over a historical block range.
//!
//! Walks the range in disjoint fixed-size windows (start-inclusive,
//! end-exclusive, so boundary blocks are never counted twice), tolerates
//! per-window query failures, and ranks signer addresses by stake count.

use crate::chain::abi;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use std::collections::HashMap;
use tracing::{info, warn};

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub count: u64,
}

/// Source of Staked signer addresses for a block window. The seam exists so
/// tests can inject window failures without an RPC endpoint.
pub trait StakeLogSource {
    /// Signer addresses of all Staked events in `[from, to_exclusive)`,
    /// one entry per event.
    async fn staked_signers(&self, from: u64, to_exclusive: u64) -> anyhow::Result<Vec<Address>>;
}

/// Scan `[from, to)` in windows of `window` blocks and rank signers by stake
/// count. Failed windows are logged and skipped; their events are omitted.
/// Ranking is a stable descending sort, so ties keep first-seen order.
pub async fn scan_range<S: StakeLogSource>(
    source: &S,
    from: u64,
    to: u64,
    window: u64,
    top_n: usize,
) -> Vec<LeaderboardEntry> {
    let window = window.max(1);
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut skipped = 0usize;

    let mut start = from;
    while start < to {
        let end = (start + window).min(to);
        match source.staked_signers(start, end).await {
            Ok(signers) => {
                for signer in signers {
                    match index.get(&signer) {
                        Some(&i) => entries[i].count += 1,
                        None => {
                            index.insert(signer, entries.len());
                            entries.push(LeaderboardEntry {
                                address: signer,
                                count: 1,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!(from = start, to = end, error = %e, "window query failed, skipping");
                skipped += 1;
            }
        }
        start = end;
    }

    if skipped > 0 {
        info!(skipped, "leaderboard scan finished with skipped windows");
    }

    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(top_n);
    entries
}

/// Provider-backed source: one eth_getLogs per window.
pub struct ChainLogSource<P> {
    provider: P,
    contract: Address,
}

impl<P> ChainLogSource<P> {
    pub fn new(provider: P, contract: Address) -> Self {
        Self { provider, contract }
    }
}

impl<P: Provider> StakeLogSource for ChainLogSource<P> {
    async fn staked_signers(&self, from: u64, to_exclusive: u64) -> anyhow::Result<Vec<Address>> {
        if to_exclusive <= from {
            return Ok(Vec::new());
        }
        // eth_getLogs block bounds are inclusive
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(*abi::STAKED_TOPIC)
            .from_block(from)
            .to_block(to_exclusive - 1);

        let logs = self.provider.get_logs(&filter).await?;
        Ok(logs
            .iter()
            .filter_map(|log| {
                let topic = log.topics().get(1)?;
                Some(Address::from_slice(&topic.0[12..]))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    struct MockSource {
        windows: Mutex<Vec<(u64, u64)>>,
        fail_from: Option<u64>,
        signers: HashMap<u64, Vec<Address>>,
    }

    impl MockSource {
        fn new(fail_from: Option<u64>, signers: HashMap<u64, Vec<Address>>) -> Self {
            Self {
                windows: Mutex::new(Vec::new()),
                fail_from,
                signers,
            }
        }
    }

    impl StakeLogSource for MockSource {
        async fn staked_signers(&self, from: u64, to_exclusive: u64) -> anyhow::Result<Vec<Address>> {
            self.windows.lock().unwrap().push((from, to_exclusive));
            if self.fail_from == Some(from) {
                anyhow::bail!("simulated RPC failure");
            }
            Ok(self.signers.get(&from).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_windows_are_disjoint_and_cover_range() {
        let source = MockSource::new(None, HashMap::new());
        scan_range(&source, 1000, 1500, 50, 10).await;

        let windows = source.windows.lock().unwrap();
        assert_eq!(windows.len(), 10);
        assert_eq!(windows[0].0, 1000);
        assert_eq!(windows.last().unwrap().1, 1500);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "window end must equal next start");
        }
    }

    #[tokio::test]
    async fn test_ragged_final_window_is_clamped() {
        let source = MockSource::new(None, HashMap::new());
        scan_range(&source, 100, 230, 50, 10).await;

        let windows = source.windows.lock().unwrap();
        assert_eq!(*windows, vec![(100, 150), (150, 200), (200, 230)]);
    }

    #[tokio::test]
    async fn test_failed_window_is_skipped_not_fatal() {
        let mut signers = HashMap::new();
        signers.insert(1000, vec![addr(0xaa), addr(0xbb), addr(0xaa)]);
        signers.insert(1200, vec![addr(0xcc), addr(0xcc), addr(0xcc), addr(0xcc)]);
        signers.insert(1300, vec![addr(0xbb)]);

        let source = MockSource::new(Some(1200), signers);
        let board = scan_range(&source, 1000, 1500, 50, 10).await;

        // 0xcc only staked in the failed window, so it is absent entirely.
        // 0xaa and 0xbb tie at 2; 0xaa was seen first and stays first.
        assert_eq!(
            board,
            vec![
                LeaderboardEntry { address: addr(0xaa), count: 2 },
                LeaderboardEntry { address: addr(0xbb), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_ranking_descending_with_first_seen_ties() {
        let mut signers = HashMap::new();
        signers.insert(0, vec![addr(1), addr(2), addr(3), addr(2)]);

        let source = MockSource::new(None, signers);
        let board = scan_range(&source, 0, 10, 10, 10).await;

        assert_eq!(board[0].address, addr(2));
        assert_eq!(board[0].count, 2);
        // 1 and 3 tie at 1; 1 was seen first
        assert_eq!(board[1].address, addr(1));
        assert_eq!(board[2].address, addr(3));
    }

    #[tokio::test]
    async fn test_top_n_truncation() {
        let mut signers = HashMap::new();
        signers.insert(0, (0..12).map(|n| addr(n as u8 + 1)).collect());

        let source = MockSource::new(None, signers);
        let board = scan_range(&source, 0, 10, 10, 10).await;
        assert_eq!(board.len(), 10);
    }
}
