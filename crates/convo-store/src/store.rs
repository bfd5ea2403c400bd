//! The store contract: async writes plus full-snapshot subscriptions.

use crate::path::FeedPath;
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::warn;

/// Buffered snapshots per subscription before the producer starts dropping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One live subscription to a subtree of the feed.
///
/// The first delivery is the snapshot current at subscribe time (possibly
/// `Value::Null` for an empty subtree); every later delivery is the full
/// subtree after a change. A slow consumer may skip intermediate states
/// but always ends on the newest one. Within one subscription deliveries
/// are monotonic; across subscriptions there is no ordering guarantee.
pub struct FeedSubscription {
    rx: mpsc::Receiver<Value>,
    overflow: Arc<Mutex<Option<Value>>>,
    closed: Arc<AtomicBool>,
}

impl FeedSubscription {
    /// Create a subscription fed by the returned sender. Used by store
    /// implementations and by test doubles that interpose on delivery.
    pub fn channel(capacity: usize) -> (FeedSnapshotSender, FeedSubscription) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let overflow = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));
        (
            FeedSnapshotSender {
                tx,
                overflow: overflow.clone(),
                closed: closed.clone(),
            },
            FeedSubscription {
                rx,
                overflow,
                closed,
            },
        )
    }

    /// Next snapshot, or `None` once the subscription is closed (either
    /// side) and everything buffered is drained.
    pub async fn recv(&mut self) -> Option<Value> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Stop the subscription. No snapshot is delivered after this returns;
    /// anything still in flight is discarded silently.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Stream for FeedSubscription {
    type Item = Value;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Value>> {
        let this = self.get_mut();
        if this.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        // Queued snapshots drain in order before the overflow slot; the
        // slot only ever holds something newer than the whole queue. The
        // lock is held across the poll so a concurrent push cannot slip a
        // snapshot into the queue between the poll and the slot check.
        let next = {
            let mut overflow = this.overflow.lock();
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(snapshot)) => Some(snapshot),
                Poll::Ready(None) => overflow.take(),
                Poll::Pending => match overflow.take() {
                    Some(snapshot) => Some(snapshot),
                    None => return Poll::Pending,
                },
            }
        };
        // A close that raced the poll above must win: the caller observes
        // no delivery after close() has returned.
        if this.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        Poll::Ready(next)
    }
}

/// Producer half of a subscription channel.
#[derive(Clone)]
pub struct FeedSnapshotSender {
    tx: mpsc::Sender<Value>,
    overflow: Arc<Mutex<Option<Value>>>,
    closed: Arc<AtomicBool>,
}

impl FeedSnapshotSender {
    /// Push a snapshot without blocking the store. When the subscriber's
    /// buffer is full, overflow coalesces into a single latest-state slot:
    /// a lagging subscriber skips intermediate snapshots but always
    /// observes the newest one.
    pub fn push(&self, snapshot: Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut overflow = self.overflow.lock();
        if overflow.is_some() {
            // Still backed up; newer state replaces the parked snapshot.
            *overflow = Some(snapshot);
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(snapshot)) = self.tx.try_send(snapshot) {
            warn!("subscriber lagging, coalescing to the latest snapshot");
            *overflow = Some(snapshot);
        }
    }

    /// True once the consumer closed or dropped its subscription.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

/// The external change-feed/store, reduced to the five operations the
/// sync core needs. All writes are atomic per path; nothing here imposes
/// ordering across independent paths.
#[async_trait]
pub trait FeedStore: Send + Sync + 'static {
    /// Subscribe to the subtree at `path`. The current snapshot is
    /// delivered immediately.
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription>;

    /// Replace the value at `path`, creating intermediate nodes.
    async fn write(&self, path: &FeedPath, value: Value) -> Result<()>;

    /// Merge `fields` into the object at `path` (last-write-wins per
    /// field). Creates the object when missing.
    async fn update(&self, path: &FeedPath, fields: serde_json::Map<String, Value>) -> Result<()>;

    /// Remove the subtree at `path`. Removing a missing path is a no-op.
    async fn remove(&self, path: &FeedPath) -> Result<()>;

    /// A fresh child key under `parent`, unique for this store instance
    /// and lexicographically ordered by creation time.
    fn generate_key(&self, parent: &FeedPath) -> String;
}
