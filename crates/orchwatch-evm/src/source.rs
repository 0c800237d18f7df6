//! `PollingBlockSource`: a [`BlockSource`] that follows the chain head over
//! JSON-RPC.
//!
//! Every poll reads `eth_blockNumber`, targets `head - confirmation_depth`
//! and walks forward from the last delivered block:
//!
//! - a block whose parent is the tracked head is appended and delivered as an
//!   `Added` group with the contract's logs;
//! - otherwise the tracked head was reorganized away: it is popped, delivered
//!   as a `Removed` group carrying the logs it had, and the walk resumes at
//!   its height.
//!
//! All groups found in one poll go out as one batch, removals first, in
//! chain order. Poll failures are reported on every subscriber's error
//! channel; the loop keeps running.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use orchwatch_core::error::WatcherError;
use orchwatch_core::source::{BlockFeed, BlockSource, Subscription};
use orchwatch_core::types::{BlockEvent, EventType};

use crate::fetcher::EvmRpcClient;
use crate::tracker::{BlockTracker, TrackedBlock};

/// Settings of a [`PollingBlockSource`].
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Only logs from this contract are fetched.
    pub contract: Address,
    /// Blocks behind the head considered final enough to deliver.
    pub confirmation_depth: u64,
    pub poll_interval: Duration,
    /// First block to deliver. `None` starts at the confirmed head.
    pub start_block: Option<u64>,
    /// Blocks kept for reorg detection.
    pub window_size: usize,
    /// Upper bound on block fetches per poll.
    pub max_blocks_per_poll: u64,
}

impl PollingConfig {
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            confirmation_depth: 12,
            poll_interval: Duration::from_millis(2_000),
            start_block: None,
            window_size: 128,
            max_blocks_per_poll: 100,
        }
    }
}

pub struct PollingBlockSource {
    client: Arc<dyn EvmRpcClient>,
    config: PollingConfig,
    tracker: BlockTracker,
    feed: BlockFeed,
}

impl PollingBlockSource {
    pub fn new(client: Arc<dyn EvmRpcClient>, config: PollingConfig) -> Self {
        Self {
            tracker: BlockTracker::new(config.window_size),
            client,
            config,
            feed: BlockFeed::new(),
        }
    }

    /// Handle for subscribing once the source has been moved into
    /// [`run`](Self::run).
    pub fn feed(&self) -> BlockFeed {
        self.feed.clone()
    }

    /// Run one poll and deliver what it found. Returns the number of block
    /// groups delivered.
    pub async fn poll_once(&mut self) -> Result<usize, WatcherError> {
        let mut batch = Vec::new();
        let result = self.advance(&mut batch).await;
        let groups = batch.len();
        // Blocks already tracked must reach subscribers even if a later fetch
        // in the same poll failed.
        if !batch.is_empty() {
            self.feed.send(batch).await;
        }
        result.map(|_| groups)
    }

    async fn advance(&mut self, batch: &mut Vec<BlockEvent>) -> Result<(), WatcherError> {
        let head = self.client.get_block_number().await?;
        let target = head.saturating_sub(self.config.confirmation_depth);
        let mut next = match self.tracker.head() {
            Some(h) => h.number + 1,
            None => self.config.start_block.unwrap_or(target),
        };

        let mut fetched = 0u64;
        while next <= target && fetched < self.config.max_blocks_per_poll {
            let Some(header) = self.client.get_block(next).await? else {
                break;
            };
            fetched += 1;

            if !self.tracker.extends_head(&header) {
                if let Some(dropped) = self.tracker.pop() {
                    warn!(
                        block = dropped.header.number,
                        hash = %dropped.header.hash,
                        logs = dropped.logs.len(),
                        "reorg detected, dropping block"
                    );
                    next = dropped.header.number;
                    batch.push(BlockEvent {
                        event_type: EventType::Removed,
                        block: dropped.header,
                        logs: dropped
                            .logs
                            .into_iter()
                            .map(|mut log| {
                                log.removed = true;
                                log
                            })
                            .collect(),
                    });
                }
                continue;
            }

            let logs = self.client.get_logs(header.hash, self.config.contract).await?;
            debug!(block = header.number, hash = %header.hash, logs = logs.len(), "block added");
            self.tracker.push(TrackedBlock {
                header: header.clone(),
                logs: logs.clone(),
            });
            batch.push(BlockEvent {
                event_type: EventType::Added,
                block: header,
                logs,
            });
            next += 1;
        }
        Ok(())
    }

    /// Poll every `poll_interval` until `stop` flips to `true` or its sender
    /// is dropped.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        if *stop.borrow() {
            return;
        }
        info!(
            contract = %self.config.contract,
            confirmations = self.config.confirmation_depth,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "block poller started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.poll_once().await {
                        warn!(error = %err, "block poll failed");
                        self.feed.send_error(&err.to_string());
                    }
                }
            }
        }
        info!("block poller stopped");
    }
}

impl BlockSource for PollingBlockSource {
    fn subscribe(&self, sink: mpsc::Sender<Vec<BlockEvent>>) -> Subscription {
        self.feed.subscribe(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use alloy_primitives::{Bytes, B256};
    use async_trait::async_trait;
    use orchwatch_core::types::{BlockHeader, RawLog};

    const CONTRACT: Address = Address::new([0x51; 20]);

    fn hash(number: u64, fork: u8) -> B256 {
        let mut b = [0u8; 32];
        b[0] = fork;
        b[24..].copy_from_slice(&number.to_be_bytes());
        B256::from(b)
    }

    #[derive(Default)]
    struct Chain {
        head: u64,
        blocks: HashMap<u64, BlockHeader>,
        logs: HashMap<B256, Vec<RawLog>>,
        failing: bool,
    }

    #[derive(Default)]
    struct MockChain(Mutex<Chain>);

    impl MockChain {
        /// Set blocks `from..=to` on `fork`, parented on `parent_fork` at `from - 1`.
        fn extend(&self, from: u64, to: u64, fork: u8, parent_fork: u8) {
            let mut c = self.0.lock().unwrap();
            for n in from..=to {
                let parent = if n == from { hash(n - 1, parent_fork) } else { hash(n - 1, fork) };
                c.blocks.insert(
                    n,
                    BlockHeader {
                        number: n,
                        hash: hash(n, fork),
                        parent_hash: parent,
                        timestamp: n * 12,
                    },
                );
            }
            c.head = c.head.max(to);
        }

        fn add_log(&self, number: u64, fork: u8) {
            let block_hash = hash(number, fork);
            self.0.lock().unwrap().logs.entry(block_hash).or_default().push(RawLog {
                address: CONTRACT,
                topics: vec![B256::repeat_byte(1)],
                data: Bytes::new(),
                block_number: number,
                block_hash,
                tx_hash: B256::repeat_byte(0xcc),
                log_index: 0,
                removed: false,
            });
        }
    }

    #[async_trait]
    impl EvmRpcClient for MockChain {
        async fn get_block_number(&self) -> Result<u64, WatcherError> {
            let c = self.0.lock().unwrap();
            if c.failing {
                return Err(WatcherError::Chain("node unavailable".into()));
            }
            Ok(c.head)
        }

        async fn get_block(&self, number: u64) -> Result<Option<BlockHeader>, WatcherError> {
            Ok(self.0.lock().unwrap().blocks.get(&number).cloned())
        }

        async fn get_logs(&self, block_hash: B256, address: Address) -> Result<Vec<RawLog>, WatcherError> {
            assert_eq!(address, CONTRACT);
            Ok(self
                .0
                .lock()
                .unwrap()
                .logs
                .get(&block_hash)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn config(depth: u64, start: Option<u64>) -> PollingConfig {
        PollingConfig {
            confirmation_depth: depth,
            start_block: start,
            poll_interval: Duration::from_millis(10),
            ..PollingConfig::new(CONTRACT)
        }
    }

    fn shape(batch: &[BlockEvent]) -> Vec<(EventType, u64)> {
        batch.iter().map(|e| (e.event_type, e.block.number)).collect()
    }

    #[tokio::test]
    async fn catches_up_from_start_block() {
        let chain = Arc::new(MockChain::default());
        chain.extend(1, 5, 0, 0);
        chain.add_log(3, 0);

        let mut source = PollingBlockSource::new(chain, config(0, Some(1)));
        let (tx, mut rx) = mpsc::channel(4);
        let _sub = source.subscribe(tx);

        assert_eq!(source.poll_once().await.unwrap(), 5);
        let batch = rx.recv().await.unwrap();
        assert_eq!(
            shape(&batch),
            (1..=5).map(|n| (EventType::Added, n)).collect::<Vec<_>>()
        );
        assert_eq!(batch[2].logs.len(), 1);

        // Nothing new.
        assert_eq!(source.poll_once().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn respects_confirmation_depth() {
        let chain = Arc::new(MockChain::default());
        chain.extend(1, 10, 0, 0);

        let mut source = PollingBlockSource::new(chain.clone(), config(3, None));
        let (tx, mut rx) = mpsc::channel(4);
        let _sub = source.subscribe(tx);

        source.poll_once().await.unwrap();
        assert_eq!(shape(&rx.recv().await.unwrap()), vec![(EventType::Added, 7)]);

        chain.extend(11, 11, 0, 0);
        source.poll_once().await.unwrap();
        assert_eq!(shape(&rx.recv().await.unwrap()), vec![(EventType::Added, 8)]);
    }

    #[tokio::test]
    async fn reorg_emits_removed_then_added() {
        let chain = Arc::new(MockChain::default());
        chain.extend(1, 5, 0, 0);
        chain.add_log(4, 0);

        let mut source = PollingBlockSource::new(chain.clone(), config(0, Some(1)));
        let (tx, mut rx) = mpsc::channel(4);
        let _sub = source.subscribe(tx);
        source.poll_once().await.unwrap();
        rx.recv().await.unwrap();

        // Blocks 4 and 5 are replaced by a fork that also adds block 6.
        chain.extend(4, 6, 1, 0);
        chain.add_log(5, 1);

        source.poll_once().await.unwrap();
        let batch = rx.recv().await.unwrap();
        assert_eq!(
            shape(&batch),
            vec![
                (EventType::Removed, 5),
                (EventType::Removed, 4),
                (EventType::Added, 4),
                (EventType::Added, 5),
                (EventType::Added, 6),
            ]
        );
        assert_eq!(batch[1].block.hash, hash(4, 0));
        assert_eq!(batch[1].logs.len(), 1);
        assert!(batch[1].logs[0].removed);
        assert_eq!(batch[3].block.hash, hash(5, 1));
        assert_eq!(batch[3].logs.len(), 1);
        assert!(!batch[3].logs[0].removed);
    }

    #[tokio::test]
    async fn run_reports_errors_and_stops() {
        let chain = Arc::new(MockChain::default());
        chain.0.lock().unwrap().failing = true;

        let source = PollingBlockSource::new(chain, config(0, None));
        let (tx, _rx) = mpsc::channel(4);
        let mut sub = source.subscribe(tx);

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(source.run(stop_rx));

        let err = tokio::time::timeout(Duration::from_secs(2), sub.err())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, WatcherError::Subscription(_)));

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
