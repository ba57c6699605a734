//! Chain event monitor.
//!
//! Subscribes to Base WebSocket RPC for Staked and Transfer logs on the
//! configured contract, decodes them, and emits typed `ChainSignal`s via a
//! tokio channel.
//!
//! Features:
//! - Automatic reconnection with exponential backoff
//! - Rotation through primary + fallback WebSocket providers
//! - HTTP log-polling fallback when no WebSocket provider is reachable
//! - Replay dedup on (event, tokenId, blockNumber) across reconnects

use crate::chain::abi;
use crate::chain::{ChainSignal, SeenCache, StakeEvent, TransferEvent};
use crate::config::ChainConfig;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use futures_util::StreamExt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Max dedup entries kept across reconnects.
const SEEN_CAPACITY: usize = 1024;

/// The monitor that watches the staking contract.
pub struct ChainMonitor {
    config: ChainConfig,
    signal_tx: mpsc::UnboundedSender<ChainSignal>,
    seen: SeenCache,
}

impl ChainMonitor {
    pub fn new(config: ChainConfig, signal_tx: mpsc::UnboundedSender<ChainSignal>) -> Self {
        if Address::from_str(&config.contract).is_err() {
            warn!(contract = %config.contract, "contract address does not parse, filter will be empty");
        }
        Self {
            config,
            signal_tx,
            seen: SeenCache::new(SEEN_CAPACITY),
        }
    }

    /// Start the monitor in a background task. Returns immediately.
    /// The monitor will reconnect automatically on transport failures.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_forever().await;
        })
    }

    /// Build the list of WebSocket URLs to rotate through: primary first, then fallbacks.
    fn ws_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        if !self.config.ws_url.is_empty() {
            urls.push(self.config.ws_url.clone());
        }
        for url in &self.config.fallback_ws_urls {
            if !url.is_empty() && urls.iter().all(|u| u != url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    /// Main loop: connect, subscribe, process events, reconnect on failure.
    /// Rotates through WebSocket providers; once a full rotation has failed,
    /// drops to HTTP log polling if an HTTP URL is configured.
    async fn run_forever(mut self) {
        let max_backoff = Duration::from_secs(60);
        let ws_urls = self.ws_urls();
        let poll_available = !self.config.http_url.is_empty();

        if ws_urls.is_empty() && !poll_available {
            error!("no RPC endpoints configured (ws_url, fallback_ws_urls and http_url all empty)");
            return;
        }

        let mut url_index = 0;
        let mut consecutive_failures: usize = 0;

        loop {
            let ws_exhausted = consecutive_failures >= ws_urls.len();
            let polling = ws_urls.is_empty() || (ws_exhausted && poll_available);

            let result = if polling {
                info!(
                    url = %self.config.http_url,
                    interval_secs = self.config.poll_interval_secs,
                    "polling Base over HTTP"
                );
                self.run_poll_session().await
            } else {
                let url = ws_urls[url_index].clone();
                info!(
                    url = %url,
                    provider = url_index + 1,
                    total = ws_urls.len(),
                    "connecting to Base WebSocket"
                );
                self.run_ws_session(&url).await
            };

            match result {
                Ok(()) => {
                    info!("chain session ended cleanly");
                    consecutive_failures = 0;
                }
                Err(e) => {
                    error!(error = %e, "chain session error");
                    let _ = self.signal_tx.send(ChainSignal::Disconnected {
                        reason: e.to_string(),
                    });
                    if polling {
                        if ws_urls.is_empty() {
                            consecutive_failures += 1;
                        } else {
                            // A failed poll session restarts the WebSocket rotation
                            consecutive_failures = 0;
                        }
                    } else {
                        consecutive_failures += 1;
                        url_index = (url_index + 1) % ws_urls.len();
                    }
                }
            }

            // If we still have untried providers in this rotation, try them
            // quickly. Only back off once the whole rotation has failed.
            let backoff = if consecutive_failures == 0 {
                Duration::from_secs(1)
            } else if consecutive_failures < ws_urls.len() {
                Duration::from_secs(2)
            } else {
                let cycle = consecutive_failures / ws_urls.len().max(1);
                let secs = 2u64.pow(cycle.min(5) as u32).min(max_backoff.as_secs());
                Duration::from_secs(secs)
            };

            info!(
                backoff_secs = backoff.as_secs(),
                failures = consecutive_failures,
                "reconnecting"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// A single WebSocket session: connect, subscribe, process live events.
    async fn run_ws_session(&mut self, url: &str) -> anyhow::Result<()> {
        let ws = WsConnect::new(url);
        let provider = ProviderBuilder::new().connect_ws(ws).await?;

        let _ = self.signal_tx.send(ChainSignal::Connected);

        let current_block = provider.get_block_number().await?;
        info!(block = current_block, "Base WebSocket connected, streaming forward");

        let filter = self.build_filter();
        let sub = provider.subscribe_logs(&filter).await?;
        let mut stream = sub.into_stream();

        info!("subscribed to contract events");

        while let Some(log) = stream.next().await {
            self.process_log(&log);
        }

        // Stream ended — will reconnect
        Ok(())
    }

    /// Fallback transport: poll eth_getLogs over HTTP for new blocks.
    async fn run_poll_session(&mut self) -> anyhow::Result<()> {
        let provider = ProviderBuilder::new().connect_http(self.config.http_url.parse()?);

        let _ = self.signal_tx.send(ChainSignal::Connected);

        let mut from = provider.get_block_number().await?;
        info!(block = from, "HTTP provider connected, polling forward");

        loop {
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;

            let latest = provider.get_block_number().await?;
            if latest <= from {
                continue;
            }

            let filter = self.build_filter().from_block(from + 1).to_block(latest);
            let logs = provider.get_logs(&filter).await?;
            for log in &logs {
                self.process_log(log);
            }
            from = latest;
        }
    }

    /// Build the log filter covering the contract and both event topics.
    fn build_filter(&self) -> Filter {
        let mut addresses: Vec<Address> = Vec::new();
        if let Ok(addr) = Address::from_str(&self.config.contract) {
            addresses.push(addr);
        }

        let topics = vec![*abi::STAKED_TOPIC, abi::TRANSFER_TOPIC];

        Filter::new().address(addresses).event_signature(topics)
    }

    /// Decode a single log entry and emit the matching signal. Malformed or
    /// redelivered logs are dropped.
    fn process_log(&mut self, log: &Log) {
        let Some(topic0) = log.topic0().copied() else {
            debug!("log has no topic0");
            return;
        };
        let block_number = log.block_number.unwrap_or(0);

        if topic0 == *abi::STAKED_TOPIC {
            let Some(event) = decode_staked(log) else {
                debug!(block = block_number, "malformed Staked log");
                return;
            };
            if !self.seen.insert((topic0, event.token_id, block_number)) {
                debug!(token = %event.token_id, block = block_number, "duplicate Staked log dropped");
                return;
            }
            let _ = self.signal_tx.send(ChainSignal::Staked(event));
        } else if topic0 == abi::TRANSFER_TOPIC {
            let Some(event) = decode_transfer(log) else {
                debug!(block = block_number, "non-ERC-721 Transfer log skipped");
                return;
            };
            if !self.seen.insert((topic0, event.token_id, block_number)) {
                debug!(token = %event.token_id, block = block_number, "duplicate Transfer log dropped");
                return;
            }
            let _ = self.signal_tx.send(ChainSignal::Transferred(event));
        } else {
            debug!(topic = %topic0, "unrecognised event topic");
        }
    }
}

/// Staked(address indexed user, uint256 tokenId, uint256 epochStart)
///
/// Some deployments also index tokenId; both layouts are handled.
fn decode_staked(log: &Log) -> Option<StakeEvent> {
    let topics = log.topics();
    let user = Address::from_slice(&topics.get(1)?.0[12..]);
    let data = &log.data().data;

    let (token_id, epoch_start) = if topics.len() >= 3 {
        (U256::from_be_bytes(topics[2].0), read_word(data, 0)?)
    } else {
        (read_word(data, 0)?, read_word(data, 1)?)
    };

    Some(StakeEvent {
        user,
        token_id,
        epoch_start,
        block_number: log.block_number.unwrap_or(0),
        block_timestamp: log.block_timestamp.unwrap_or(0),
    })
}

/// Transfer(address indexed from, address indexed to, uint256 indexed tokenId)
///
/// ERC-721 only: the ERC-20 Transfer shares this topic0 but carries the value
/// in the data field and has three topics, not four.
fn decode_transfer(log: &Log) -> Option<TransferEvent> {
    let topics = log.topics();
    if topics.len() < 4 {
        return None;
    }

    Some(TransferEvent {
        from: Address::from_slice(&topics[1].0[12..]),
        to: Address::from_slice(&topics[2].0[12..]),
        token_id: U256::from_be_bytes(topics[3].0),
        block_number: log.block_number.unwrap_or(0),
    })
}

/// Read the `index`-th 32-byte ABI word from a log's data field.
fn read_word(data: &[u8], index: usize) -> Option<U256> {
    let start = index * 32;
    let bytes: [u8; 32] = data.get(start..start + 32)?.try_into().ok()?;
    Some(U256::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, LogData};

    fn word_from_addr(addr: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        B256::from(word)
    }

    fn log_with(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x22),
                data: LogData::new_unchecked(topics, data.into()),
            },
            block_number: Some(123),
            block_timestamp: Some(1_700_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_staked_unindexed_token() {
        let user = Address::repeat_byte(0x11);
        let mut data = Vec::new();
        data.extend_from_slice(&U256::from(42u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(1_700_000_000u64).to_be_bytes::<32>());

        let log = log_with(vec![*abi::STAKED_TOPIC, word_from_addr(user)], data);
        let event = decode_staked(&log).unwrap();
        assert_eq!(event.user, user);
        assert_eq!(event.token_id, U256::from(42u64));
        assert_eq!(event.epoch_start, U256::from(1_700_000_000u64));
        assert_eq!(event.block_number, 123);
    }

    #[test]
    fn test_decode_staked_indexed_token() {
        let user = Address::repeat_byte(0x11);
        let data = U256::from(7u64).to_be_bytes::<32>().to_vec();

        let log = log_with(
            vec![
                *abi::STAKED_TOPIC,
                word_from_addr(user),
                B256::from(U256::from(42u64)),
            ],
            data,
        );
        let event = decode_staked(&log).unwrap();
        assert_eq!(event.token_id, U256::from(42u64));
        assert_eq!(event.epoch_start, U256::from(7u64));
    }

    #[test]
    fn test_decode_staked_rejects_missing_data() {
        let log = log_with(
            vec![*abi::STAKED_TOPIC, word_from_addr(Address::repeat_byte(0x11))],
            Vec::new(),
        );
        assert!(decode_staked(&log).is_none());
    }

    #[test]
    fn test_decode_transfer() {
        let from = Address::repeat_byte(0x0a);
        let to = Address::repeat_byte(0x0b);
        let log = log_with(
            vec![
                abi::TRANSFER_TOPIC,
                word_from_addr(from),
                word_from_addr(to),
                B256::from(U256::from(9u64)),
            ],
            Vec::new(),
        );
        let event = decode_transfer(&log).unwrap();
        assert_eq!(event.from, from);
        assert_eq!(event.to, to);
        assert_eq!(event.token_id, U256::from(9u64));
    }

    #[test]
    fn test_decode_transfer_rejects_erc20_shape() {
        // ERC-20 Transfer: only from/to indexed, value in data
        let log = log_with(
            vec![
                abi::TRANSFER_TOPIC,
                word_from_addr(Address::repeat_byte(0x0a)),
                word_from_addr(Address::repeat_byte(0x0b)),
            ],
            U256::from(1000u64).to_be_bytes::<32>().to_vec(),
        );
        assert!(decode_transfer(&log).is_none());
    }
}
