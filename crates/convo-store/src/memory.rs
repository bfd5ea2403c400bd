//! In-memory reference implementation of [`FeedStore`].
//!
//! Holds the whole feed as one JSON tree behind a mutex and fans full
//! snapshots out to overlapping subscribers on every mutation. Snapshot
//! computation happens inside the mutation's critical section, so each
//! subscription observes a monotonic sequence of states.

use crate::keys::KeyGenerator;
use crate::path::FeedPath;
use crate::store::{
    FeedSnapshotSender, FeedStore, FeedSubscription, Result, DEFAULT_CHANNEL_CAPACITY,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

pub struct MemoryStore {
    inner: Mutex<Inner>,
    keys: KeyGenerator,
    capacity: usize,
}

struct Inner {
    tree: Value,
    subscribers: Vec<Subscriber>,
}

struct Subscriber {
    path: FeedPath,
    sender: FeedSnapshotSender,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tree: Value::Object(Map::new()),
                subscribers: Vec::new(),
            }),
            keys: KeyGenerator::new(),
            capacity,
        }
    }

    /// Current snapshot of a subtree, mainly for assertions in tests.
    pub fn snapshot(&self, path: &FeedPath) -> Value {
        get_at(&self.inner.lock().tree, path)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn notify(&mut self, changed: &FeedPath) {
        self.subscribers.retain(|sub| !sub.sender.is_closed());
        for sub in &self.subscribers {
            if sub.path.overlaps(changed) {
                sub.sender.push(get_at(&self.tree, &sub.path));
            }
        }
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn subscribe(&self, path: &FeedPath) -> Result<FeedSubscription> {
        let mut inner = self.inner.lock();
        let (sender, subscription) = FeedSubscription::channel(self.capacity);
        sender.push(get_at(&inner.tree, path));
        inner.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        Ok(subscription)
    }

    async fn write(&self, path: &FeedPath, value: Value) -> Result<()> {
        let mut inner = self.inner.lock();
        if value.is_null() {
            remove_at(&mut inner.tree, path);
        } else {
            set_at(&mut inner.tree, path, value);
        }
        inner.notify(path);
        Ok(())
    }

    async fn update(&self, path: &FeedPath, fields: Map<String, Value>) -> Result<()> {
        let mut inner = self.inner.lock();
        {
            let node = object_at(&mut inner.tree, path);
            for (key, value) in fields {
                if value.is_null() {
                    node.remove(&key);
                } else {
                    node.insert(key, value);
                }
            }
        }
        inner.notify(path);
        Ok(())
    }

    async fn remove(&self, path: &FeedPath) -> Result<()> {
        let mut inner = self.inner.lock();
        remove_at(&mut inner.tree, path);
        inner.notify(path);
        Ok(())
    }

    fn generate_key(&self, _parent: &FeedPath) -> String {
        self.keys.next()
    }
}

fn get_at(tree: &Value, path: &FeedPath) -> Value {
    let mut node = tree;
    for segment in path.segments() {
        match node.get(segment) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

/// Mutable handle on the object at `path`, materializing it (and every
/// intermediate node) as an object when absent or of another shape.
fn object_at<'a>(tree: &'a mut Value, path: &FeedPath) -> &'a mut Map<String, Value> {
    let mut node = tree;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .unwrap()
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut().unwrap()
}

fn set_at(tree: &mut Value, path: &FeedPath, value: Value) {
    match path.parent() {
        None => *tree = value,
        Some(parent) => {
            let key = path.key().unwrap().to_string();
            object_at(tree, &parent).insert(key, value);
        }
    }
}

fn remove_at(tree: &mut Value, path: &FeedPath) {
    let Some(parent) = path.parent() else {
        *tree = Value::Object(Map::new());
        return;
    };
    let key = path.key().unwrap();
    let mut node = &mut *tree;
    for segment in parent.segments() {
        match node.get_mut(segment) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(key);
    }
    // Empty containers disappear, matching feed semantics where a node
    // with no children does not exist.
    if node.as_object().is_some_and(|m| m.is_empty()) {
        remove_at(tree, &parent);
    }
}
