#![allow(dead_code)]

//! Test doubles around the in-memory store.

use async_trait::async_trait;
use convo_store::{FeedPath, FeedStore, FeedSubscription, MemoryStore, Result, StoreError};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Counts mutating calls while delegating everything to a real store.
pub struct SpyStore {
    pub inner: Arc<MemoryStore>,
    pub writes: AtomicUsize,
    pub updates: AtomicUsize,
    pub removes: AtomicUsize,
}

impl SpyStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            writes: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedStore for SpyStore {
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription> {
        self.inner.subscribe(path).await
    }

    async fn write(&self, path: &FeedPath, value: Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, value).await
    }

    async fn update(&self, path: &FeedPath, fields: Map<String, Value>) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(path, fields).await
    }

    async fn remove(&self, path: &FeedPath) -> Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(path).await
    }

    fn generate_key(&self, parent: &FeedPath) -> String {
        self.inner.generate_key(parent)
    }
}

/// Holds every `write` until a permit is released, to simulate in-flight
/// network requests with controllable resolution timing.
pub struct GatedWriteStore {
    pub inner: Arc<MemoryStore>,
    gate: Semaphore,
}

impl GatedWriteStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            gate: Semaphore::new(0),
        }
    }

    /// Let one pending write through.
    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl FeedStore for GatedWriteStore {
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription> {
        self.inner.subscribe(path).await
    }

    async fn write(&self, path: &FeedPath, value: Value) -> Result<()> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("gate closed".into()))?;
        self.inner.write(path, value).await
    }

    async fn update(&self, path: &FeedPath, fields: Map<String, Value>) -> Result<()> {
        self.inner.update(path, fields).await
    }

    async fn remove(&self, path: &FeedPath) -> Result<()> {
        self.inner.remove(path).await
    }

    fn generate_key(&self, parent: &FeedPath) -> String {
        self.inner.generate_key(parent)
    }
}

/// Delays the first delivery of subscriptions under one root until
/// released; everything else passes straight through. Used to prove the
/// index waits for both of its sources.
pub struct HeldSubscriptionStore {
    pub inner: Arc<MemoryStore>,
    held_root: FeedPath,
    release: Arc<Notify>,
}

impl HeldSubscriptionStore {
    pub fn new(held_root: FeedPath) -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            held_root,
            release: Arc::new(Notify::new()),
        }
    }

    pub fn release(&self) {
        self.release.notify_waiters();
    }
}

#[async_trait]
impl FeedStore for HeldSubscriptionStore {
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription> {
        let mut upstream = self.inner.subscribe(path).await?;
        if path != &self.held_root {
            return Ok(upstream);
        }
        let (sender, subscription) = FeedSubscription::channel(64);
        let release = self.release.clone();
        tokio::spawn(async move {
            release.notified().await;
            while let Some(snapshot) = upstream.recv().await {
                if sender.is_closed() {
                    break;
                }
                sender.push(snapshot);
            }
        });
        Ok(subscription)
    }

    async fn write(&self, path: &FeedPath, value: Value) -> Result<()> {
        self.inner.write(path, value).await
    }

    async fn update(&self, path: &FeedPath, fields: Map<String, Value>) -> Result<()> {
        self.inner.update(path, fields).await
    }

    async fn remove(&self, path: &FeedPath) -> Result<()> {
        self.inner.remove(path).await
    }

    fn generate_key(&self, parent: &FeedPath) -> String {
        self.inner.generate_key(parent)
    }
}

/// Fails every `update` call; writes succeed. Reproduces the stale group
/// summary after a successful message write.
pub struct FailingUpdateStore {
    pub inner: Arc<MemoryStore>,
}

impl FailingUpdateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
        }
    }
}

#[async_trait]
impl FeedStore for FailingUpdateStore {
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription> {
        self.inner.subscribe(path).await
    }

    async fn write(&self, path: &FeedPath, value: Value) -> Result<()> {
        self.inner.write(path, value).await
    }

    async fn update(&self, _path: &FeedPath, _fields: Map<String, Value>) -> Result<()> {
        Err(StoreError::Unavailable("update rejected by test".into()))
    }

    async fn remove(&self, path: &FeedPath) -> Result<()> {
        self.inner.remove(path).await
    }

    fn generate_key(&self, parent: &FeedPath) -> String {
        self.inner.generate_key(parent)
    }
}

pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
