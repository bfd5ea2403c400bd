//! Merged, recency-sorted conversation listing.
//!
//! Watches the raw direct-chat and group collections independently,
//! projects each into [`ConversationSummary`] rows for one participant,
//! and republishes the merged list whenever either source fires. The
//! first publish waits until both sources have delivered at least once,
//! so the listing never flashes an incomplete merge.

use crate::config::SyncConfig;
use crate::directory::{AuthProvider, UserDirectory};
use crate::error::{Result, SyncError};
use crate::identity::ConversationId;
use crate::message_store::normalize_snapshot;
use crate::models::{ConversationKind, ConversationSummary, Group};
use crate::paths;
use convo_store::FeedStore;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

pub struct ConversationIndex {
    store: Arc<dyn FeedStore>,
    directory: Arc<dyn UserDirectory>,
    config: SyncConfig,
}

impl ConversationIndex {
    pub fn new(
        store: Arc<dyn FeedStore>,
        directory: Arc<dyn UserDirectory>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Watch the merged listing for `me`.
    pub async fn watch(&self, me: &str) -> Result<IndexSubscription> {
        let mut chats = self.store.subscribe(&paths::conversations_root()).await?;
        let mut groups = self.store.subscribe(&paths::groups_root()).await?;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let closed = Arc::new(AtomicBool::new(false));
        let closed_pump = closed.clone();
        let directory = self.directory.clone();
        let me = me.to_string();

        let pump = tokio::spawn(async move {
            let mut direct: Vec<ConversationSummary> = Vec::new();
            let mut group_rows: Vec<ConversationSummary> = Vec::new();
            let mut chats_loaded = false;
            let mut groups_loaded = false;

            loop {
                tokio::select! {
                    snapshot = chats.recv() => {
                        let Some(snapshot) = snapshot else { break };
                        direct = project_direct(&snapshot, &me, directory.as_ref()).await;
                        chats_loaded = true;
                    }
                    snapshot = groups.recv() => {
                        let Some(snapshot) = snapshot else { break };
                        group_rows = project_groups(&snapshot, &me);
                        groups_loaded = true;
                    }
                }
                // Both sources must have reported before the first merge
                // goes out.
                if !(chats_loaded && groups_loaded) {
                    continue;
                }
                let merged = merge(direct.clone(), group_rows.clone());
                if closed_pump.load(Ordering::Acquire) {
                    break;
                }
                if tx.send(merged).await.is_err() {
                    break;
                }
            }
        });

        Ok(IndexSubscription { rx, closed, pump })
    }

    /// Watch the listing for whoever the auth provider reports as signed
    /// in.
    pub async fn watch_current(&self, auth: &dyn AuthProvider) -> Result<IndexSubscription> {
        let me = auth.current_participant().ok_or_else(|| {
            SyncError::InvalidParticipant("no participant signed in".into())
        })?;
        self.watch(&me).await
    }

    /// Delete the record behind a listing row: the whole direct chat, or
    /// the whole group including its messages. Irreversible.
    pub async fn remove(&self, item: &ConversationSummary) -> Result<()> {
        let path = match item.kind {
            ConversationKind::Direct => match ConversationId::parse(&item.id) {
                Some(id) => paths::conversation(&id),
                None => paths::conversations_root().child(&item.id),
            },
            ConversationKind::Group => paths::group(&item.id),
        };
        let remove = self.store.remove(&path);
        match timeout(self.config.send_timeout, remove).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::RemoteUnavailable(format!(
                "removal timed out after {:?}",
                self.config.send_timeout
            ))),
        }
    }
}

async fn project_direct(
    snapshot: &Value,
    me: &str,
    directory: &dyn UserDirectory,
) -> Vec<ConversationSummary> {
    let Some(entries) = snapshot.as_object() else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (key, record) in entries {
        let Some(conversation) = ConversationId::parse(key) else {
            warn!("skipping conversation with malformed key {}", key);
            continue;
        };
        let Some(peer) = conversation.peer_of(me) else {
            continue;
        };
        let messages = normalize_snapshot(&record[paths::MESSAGES]);
        // A conversation that never carried a message has nothing to list.
        let Some(last) = messages.last() else {
            continue;
        };

        let profile = match directory.get_profile(peer).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("profile lookup for {} failed: {}", peer, e);
                None
            }
        };
        let (display_name, handle, avatar_url) = match profile {
            Some(p) => (p.name, p.handle, p.avatar_url),
            None => (peer.to_string(), None, None),
        };

        rows.push(ConversationSummary {
            id: conversation.as_str().to_string(),
            kind: ConversationKind::Direct,
            display_name,
            handle,
            avatar_url,
            last_message: last.summary_text(),
            last_message_time: last.sent_at,
        });
    }
    rows
}

fn project_groups(snapshot: &Value, me: &str) -> Vec<ConversationSummary> {
    let Some(entries) = snapshot.as_object() else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (key, record) in entries {
        let group = match Group::from_record(key, record) {
            Ok(group) => group,
            Err(reason) => {
                warn!("skipping malformed group record {}: {}", key, reason);
                continue;
            }
        };
        if !group.members.contains(me) {
            continue;
        }
        rows.push(ConversationSummary {
            id: group.id,
            kind: ConversationKind::Group,
            display_name: group.name,
            handle: None,
            avatar_url: None,
            last_message: group.last_message,
            last_message_time: group.last_message_time,
        });
    }
    rows
}

fn merge(
    mut direct: Vec<ConversationSummary>,
    mut groups: Vec<ConversationSummary>,
) -> Vec<ConversationSummary> {
    direct.append(&mut groups);
    // Stable sort keeps equal-time rows in source order.
    direct.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    direct
}

/// Stream of merged listing snapshots.
pub struct IndexSubscription {
    rx: mpsc::Receiver<Vec<ConversationSummary>>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl IndexSubscription {
    pub async fn recv(&mut self) -> Option<Vec<ConversationSummary>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let rows = self.rx.recv().await?;
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(rows)
    }

    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.pump.abort();
        self.rx.close();
    }
}

impl Drop for IndexSubscription {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.pump.abort();
    }
}
