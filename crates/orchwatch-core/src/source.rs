//! Block subscription boundary.
//!
//! A [`BlockSource`] pushes batches of [`BlockEvent`]s into a bounded channel
//! owned by the subscriber. The returned [`Subscription`] carries the error
//! channel and the cancellation handle; dropping it unsubscribes.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::error::WatcherError;
use crate::types::BlockEvent;

/// Producer of ordered block event batches.
pub trait BlockSource: Send + Sync {
    /// Register `sink` to receive batches until the subscription is dropped
    /// or unsubscribed.
    fn subscribe(&self, sink: mpsc::Sender<Vec<BlockEvent>>) -> Subscription;
}

/// Handle to a live subscription.
#[derive(Debug)]
pub struct Subscription {
    errors: mpsc::UnboundedReceiver<WatcherError>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(
        errors: mpsc::UnboundedReceiver<WatcherError>,
        cancel: oneshot::Sender<()>,
    ) -> Self {
        Self {
            errors,
            cancel: Some(cancel),
        }
    }

    /// Wait for the next error reported by the source.
    ///
    /// Returns `None` once the source has dropped its error sender.
    pub async fn err(&mut self) -> Option<WatcherError> {
        self.errors.recv().await
    }

    /// Detach from the source. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ─── BlockFeed ───────────────────────────────────────────────────────────────

struct Subscriber {
    sink: mpsc::Sender<Vec<BlockEvent>>,
    errors: mpsc::UnboundedSender<WatcherError>,
    cancelled: oneshot::Receiver<()>,
}

impl Subscriber {
    fn is_live(&mut self) -> bool {
        matches!(
            self.cancelled.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ) && !self.sink.is_closed()
    }
}

/// In-process fan-out source.
///
/// Whatever drives block discovery (the EVM poller, a test) pushes batches
/// through [`BlockFeed::send`]; every live subscriber receives each batch in
/// order. Sending waits on each subscriber's channel capacity.
#[derive(Clone, Default)]
pub struct BlockFeed {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl BlockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_sinks(&self) -> Vec<mpsc::Sender<Vec<BlockEvent>>> {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subs.retain_mut(Subscriber::is_live);
        subs.iter().map(|s| s.sink.clone()).collect()
    }

    /// Deliver `batch` to every live subscriber. Returns how many received it.
    pub async fn send(&self, batch: Vec<BlockEvent>) -> usize {
        let sinks = self.live_sinks();
        let sends = sinks.iter().map(|sink| sink.send(batch.clone()));
        let delivered = futures::future::join_all(sends)
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();
        if delivered < sinks.len() {
            tracing::debug!(
                dropped = sinks.len() - delivered,
                "subscriber channel closed during send"
            );
        }
        delivered
    }

    /// Report a source error to every live subscriber.
    pub fn send_error(&self, message: &str) {
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subs.retain_mut(Subscriber::is_live);
        for sub in subs.iter() {
            let _ = sub
                .errors
                .send(WatcherError::Subscription(message.to_string()));
        }
    }

    /// Number of subscribers that have not unsubscribed.
    pub fn subscriber_count(&self) -> usize {
        self.live_sinks().len()
    }
}

impl BlockSource for BlockFeed {
    fn subscribe(&self, sink: mpsc::Sender<Vec<BlockEvent>>) -> Subscription {
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                sink,
                errors: err_tx,
                cancelled: cancel_rx,
            });
        Subscription::new(err_rx, cancel_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, EventType};
    use alloy_primitives::B256;

    fn batch(number: u64) -> Vec<BlockEvent> {
        vec![BlockEvent {
            event_type: EventType::Added,
            block: BlockHeader {
                number,
                hash: B256::with_last_byte(number as u8),
                parent_hash: B256::ZERO,
                timestamp: 0,
            },
            logs: vec![],
        }]
    }

    #[tokio::test]
    async fn feed_delivers_to_all_subscribers() {
        let feed = BlockFeed::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let _s1 = feed.subscribe(tx1);
        let _s2 = feed.subscribe(tx2);

        assert_eq!(feed.send(batch(1)).await, 2);
        assert_eq!(rx1.recv().await.unwrap()[0].block.number, 1);
        assert_eq!(rx2.recv().await.unwrap()[0].block.number, 1);
    }

    #[tokio::test]
    async fn unsubscribe_detaches() {
        let feed = BlockFeed::new();
        let (tx, _rx) = mpsc::channel(4);
        let mut sub = feed.subscribe(tx);
        assert_eq!(feed.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(feed.subscriber_count(), 0);
        assert_eq!(feed.send(batch(2)).await, 0);
    }

    #[tokio::test]
    async fn dropping_subscription_detaches() {
        let feed = BlockFeed::new();
        let (tx, _rx) = mpsc::channel(4);
        drop(feed.subscribe(tx));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn errors_reach_subscription() {
        let feed = BlockFeed::new();
        let (tx, _rx) = mpsc::channel(4);
        let mut sub = feed.subscribe(tx);
        feed.send_error("rpc unavailable");
        let err = sub.err().await.unwrap();
        assert_eq!(err.to_string(), "Subscription error: rpc unavailable");
    }
}
