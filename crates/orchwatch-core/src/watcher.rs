//! The orchestrator watcher: subscription loop, log dispatch and the two
//! reconciliation paths.
//!
//! # Forward path (block added)
//! The decoded event is trusted. Activation looks up the current service URI
//! (the event does not carry it) and clears any scheduled deactivation;
//! deactivation writes only the deactivation round.
//!
//! # Reorg path (block removed)
//! The decoded rounds are discarded. The orchestrator's record is re-read from
//! the chain and written back as a complete snapshot, so the store converges
//! on canonical state no matter which events preceded the reorg. If the
//! lookup fails nothing is written.
//!
//! Batches and the logs inside them are processed strictly in order, one at a
//! time; a later forward write can never be overtaken by an earlier re-fetch.
//! A watcher runs at most one event loop: a second concurrent `watch()`
//! returns immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::Address;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::event::{EventDecoder, EventKind, OrchestratorEvent};
use crate::source::BlockSource;
use crate::store::OrchestratorStore;
use crate::types::{
    AddressFilter, BlockEvent, EventType, OrchestratorRecord, OrchestratorUpdate, RawLog,
    MAX_FUTURE_ROUND,
};

/// Counters snapshot for the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub batches: u64,
    pub logs_seen: u64,
    pub logs_skipped: u64,
    pub decode_errors: u64,
    pub forward_updates: u64,
    pub reorg_updates: u64,
    pub reorg_fetches: u64,
    pub reconcile_errors: u64,
}

/// Snapshots fetched on the reorg path during one batch.
struct ReorgCache {
    enabled: bool,
    records: HashMap<Address, OrchestratorRecord>,
}

impl ReorgCache {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            records: HashMap::new(),
        }
    }

    fn get(&self, address: &Address) -> Option<&OrchestratorRecord> {
        self.records.get(address)
    }

    fn insert(&mut self, address: Address, record: OrchestratorRecord) {
        if self.enabled {
            self.records.insert(address, record);
        }
    }

    fn invalidate(&mut self, address: &Address) {
        self.records.remove(address);
    }
}

/// Keeps the orchestrator store in sync with staking contract events.
pub struct OrchestratorWatcher {
    config: WatcherConfig,
    filter: AddressFilter,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn OrchestratorStore>,
    chain: Arc<dyn ChainClient>,
    decoder: Arc<dyn EventDecoder>,
    stopped: AtomicBool,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    subscribed_tx: watch::Sender<bool>,
    stats: Mutex<WatcherStats>,
}

impl OrchestratorWatcher {
    pub fn new(
        config: WatcherConfig,
        source: Arc<dyn BlockSource>,
        store: Arc<dyn OrchestratorStore>,
        chain: Arc<dyn ChainClient>,
        decoder: Arc<dyn EventDecoder>,
    ) -> Result<Self, WatcherError> {
        config.validate()?;
        let (stop_tx, _) = watch::channel(false);
        let (subscribed_tx, _) = watch::channel(false);
        Ok(Self {
            filter: config.filter(),
            config,
            source,
            store,
            chain,
            decoder,
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stop_tx,
            subscribed_tx,
            stats: Mutex::new(WatcherStats::default()),
        })
    }

    /// Run the event loop until [`stop`](Self::stop) is called or the source
    /// closes the batch channel.
    ///
    /// Returns at once if the watcher is stopped or another loop is running.
    pub async fn watch(&self) {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow() {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("orchestrator watcher loop already running");
            return;
        }

        let (sink, mut batches) = mpsc::channel(self.config.channel_capacity);
        let mut sub = self.source.subscribe(sink);
        self.subscribed_tx.send_replace(true);
        info!(
            contract = %self.config.contract_address,
            filtered = self.filter.len(),
            "orchestrator watcher started"
        );

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                Some(err) = sub.err() => {
                    error!(error = %err, "block subscription error");
                }
                batch = batches.recv() => match batch {
                    Some(events) => self.handle_block_events(events).await,
                    None => {
                        warn!("block source closed the subscription");
                        break;
                    }
                },
            }
        }

        sub.unsubscribe();
        self.subscribed_tx.send_replace(false);
        self.running.store(false, Ordering::SeqCst);
        info!("orchestrator watcher stopped");
    }

    /// Wait until the event loop is subscribed to its source. Returns `false`
    /// if the watcher is stopped first.
    ///
    /// Producers that drop batches nobody listens to should not start before
    /// this resolves.
    pub async fn subscribed(&self) -> bool {
        let mut subscribed = self.subscribed_tx.subscribe();
        let mut stop = self.stop_tx.subscribe();
        tokio::select! {
            ok = async { subscribed.wait_for(|s| *s).await.is_ok() } => ok,
            _ = async { stop.wait_for(|s| *s).await.is_ok() } => false,
        }
    }

    /// Signal the event loop to exit. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the watcher counters.
    pub fn stats(&self) -> WatcherStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn bump(&self, f: impl FnOnce(&mut WatcherStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Process one delivered batch, group by group and log by log.
    pub async fn handle_block_events(&self, events: Vec<BlockEvent>) {
        self.bump(|s| s.batches += 1);
        let mut cache = ReorgCache::new(self.config.reorg_cache);

        for event in events {
            let removed = event.event_type == EventType::Removed;
            debug!(
                block = event.block.number,
                hash = %event.block.hash,
                kind = %event.event_type,
                logs = event.logs.len(),
                "handling block"
            );
            for mut log in event.logs {
                if removed {
                    log.removed = true;
                }
                self.bump(|s| s.logs_seen += 1);
                if let Err(err) = self.handle_log(&log, &mut cache).await {
                    if err.is_decode() {
                        self.bump(|s| s.decode_errors += 1);
                    } else {
                        self.bump(|s| s.reconcile_errors += 1);
                    }
                    error!(
                        block = log.block_number,
                        tx = %log.tx_hash,
                        log_index = log.log_index,
                        removed = log.removed,
                        error = %err,
                        "failed to handle log"
                    );
                }
            }
        }
    }

    async fn handle_log(&self, log: &RawLog, cache: &mut ReorgCache) -> Result<(), WatcherError> {
        let kind = match self.decoder.find_event_name(log) {
            Ok(name) => EventKind::from_name(&name),
            Err(_) => None,
        };
        let Some(kind) = kind else {
            self.bump(|s| s.logs_skipped += 1);
            return Ok(());
        };

        let event = self.decoder.decode(kind, log)?;
        let transcoder = event.transcoder();
        if !self.filter.accepts(&transcoder) {
            self.bump(|s| s.logs_skipped += 1);
            return Ok(());
        }

        if log.removed {
            self.reconcile_removed(transcoder, kind, cache).await
        } else {
            self.reconcile_added(event, cache).await
        }
    }

    async fn reconcile_added(
        &self,
        event: OrchestratorEvent,
        cache: &mut ReorgCache,
    ) -> Result<(), WatcherError> {
        let update = match event {
            OrchestratorEvent::TranscoderActivated {
                transcoder,
                activation_round,
            } => {
                let uri = self.chain.get_service_uri(transcoder).await?;
                OrchestratorUpdate::new(transcoder)
                    .service_uri(uri)
                    .activation_round(activation_round)
                    .deactivation_round(MAX_FUTURE_ROUND)
            }
            OrchestratorEvent::TranscoderDeactivated {
                transcoder,
                deactivation_round,
            } => OrchestratorUpdate::new(transcoder).deactivation_round(deactivation_round),
        };

        cache.invalidate(&update.address);
        self.store.update_orch(&update).await?;
        self.bump(|s| s.forward_updates += 1);
        debug!(
            orchestrator = %update.address,
            activation = ?update.activation_round,
            deactivation = ?update.deactivation_round,
            "applied forward update"
        );
        Ok(())
    }

    async fn reconcile_removed(
        &self,
        transcoder: Address,
        kind: EventKind,
        cache: &mut ReorgCache,
    ) -> Result<(), WatcherError> {
        let record = match cache.get(&transcoder) {
            Some(record) => record.clone(),
            None => {
                let record = self.chain.get_transcoder(transcoder).await?;
                self.bump(|s| s.reorg_fetches += 1);
                cache.insert(transcoder, record.clone());
                record
            }
        };

        self.store
            .update_orch(&OrchestratorUpdate::snapshot(&record))
            .await?;
        self.bump(|s| s.reorg_updates += 1);
        info!(
            orchestrator = %record.address,
            event = %kind,
            activation = record.activation_round,
            deactivation = record.deactivation_round,
            "restored canonical record after reorg"
        );
        Ok(())
    }
}
