//! Ephemeral typing presence.
//!
//! One boolean per (conversation, participant), overwritten in place,
//! never part of message history. An optional idle timer clears a raised
//! flag after inactivity so a crashed peer does not look like it is
//! typing forever.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::identity::ConversationId;
use crate::paths;
use convo_store::{FeedPath, FeedStore, FeedSubscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

pub struct TypingPresence {
    store: Arc<dyn FeedStore>,
    config: SyncConfig,
    idle_timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TypingPresence {
    pub fn new(store: Arc<dyn FeedStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            idle_timers: Mutex::new(HashMap::new()),
        }
    }

    /// Raise or clear the local participant's flag. Last write wins.
    ///
    /// Callers raise it on any non-empty input change and clear it after
    /// a successful send or when the input becomes empty.
    pub async fn set_typing(
        &self,
        conversation: &ConversationId,
        participant: &str,
        is_typing: bool,
    ) -> Result<()> {
        let path = paths::typing_flag(conversation, participant);
        let write = self.store.write(&path, Value::Bool(is_typing));
        match timeout(self.config.send_timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SyncError::RemoteUnavailable(format!(
                    "typing write timed out after {:?}",
                    self.config.send_timeout
                )))
            }
        }
        self.rearm_idle_timer(path, is_typing);
        Ok(())
    }

    fn rearm_idle_timer(&self, path: FeedPath, is_typing: bool) {
        let mut timers = self.idle_timers.lock();
        let key = path.to_string();
        if let Some(previous) = timers.remove(&key) {
            previous.abort();
        }
        let Some(idle) = self.config.typing_idle_timeout else {
            return;
        };
        if !is_typing {
            return;
        }
        let store = self.store.clone();
        let send_timeout = self.config.send_timeout;
        timers.insert(
            key,
            tokio::spawn(async move {
                tokio::time::sleep(idle).await;
                let clear = store.write(&path, Value::Bool(false));
                match timeout(send_timeout, clear).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("failed to auto-clear typing flag at {}: {}", path, e),
                    Err(_) => warn!("auto-clear of typing flag at {} timed out", path),
                }
            }),
        );
    }

    /// Watch the other participant's flag. Missing or malformed values
    /// read as not typing.
    pub async fn observe_typing(
        &self,
        conversation: &ConversationId,
        other_participant: &str,
    ) -> Result<TypingSubscription> {
        let path = paths::typing_flag(conversation, other_participant);
        let inner = self.store.subscribe(&path).await?;
        Ok(TypingSubscription { inner })
    }
}

impl Drop for TypingPresence {
    fn drop(&mut self) {
        for (_, timer) in self.idle_timers.lock().drain() {
            timer.abort();
        }
    }
}

/// Boolean updates for one participant's typing flag.
pub struct TypingSubscription {
    inner: FeedSubscription,
}

impl TypingSubscription {
    pub async fn recv(&mut self) -> Option<bool> {
        let snapshot = self.inner.recv().await?;
        Some(snapshot.as_bool().unwrap_or(false))
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}
