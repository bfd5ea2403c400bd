//! Group creation, posting, and deletion.
//!
//! A group's member set is fixed at creation. Posting goes through the
//! message store, then updates the group's `lastMessage`/`lastMessageTime`
//! summary in a second, non-atomic write: when that second write fails
//! the summary is stale relative to the true last message, and the error
//! carries the written message so callers can retry or recompute lazily.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::message_store::MessageStore;
use crate::models::{Group, Message, MessageBody, MAX_GROUP_NAME_LEN};
use crate::paths;
use convo_store::{FeedStore, FeedSubscription};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::timeout;

pub struct GroupMembership {
    store: Arc<dyn FeedStore>,
    messages: MessageStore,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl GroupMembership {
    pub fn new(store: Arc<dyn FeedStore>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        let messages = MessageStore::new(store.clone(), clock.clone(), config.clone());
        Self {
            store,
            messages,
            clock,
            config,
        }
    }

    /// Create a group. The creator is always a member, listed or not.
    pub async fn create(
        &self,
        name: &str,
        creator: &str,
        members: BTreeSet<String>,
    ) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::InvalidGroupName("blank name".into()));
        }
        if name.chars().count() > MAX_GROUP_NAME_LEN {
            return Err(SyncError::InvalidGroupName(format!(
                "name longer than {MAX_GROUP_NAME_LEN} characters"
            )));
        }
        if creator.is_empty() {
            return Err(SyncError::InvalidParticipant("empty creator id".into()));
        }
        if members.is_empty() {
            return Err(SyncError::EmptyMemberSet);
        }
        let mut members = members;
        members.insert(creator.to_string());

        let now = self.clock.now_ms();
        let group_id = self.store.generate_key(&paths::groups_root());
        let group = Group {
            id: group_id.clone(),
            name: name.to_string(),
            created_by: creator.to_string(),
            created_at: now,
            members,
            last_message: String::new(),
            last_message_time: now,
        };

        let path = paths::group(&group_id);
        let write = self.store.write(&path, group.to_record());
        match timeout(self.config.send_timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SyncError::RemoteUnavailable(format!(
                    "group creation timed out after {:?}",
                    self.config.send_timeout
                )))
            }
        }
        Ok(group_id)
    }

    /// Post into a group, then refresh its listing summary. The two
    /// writes are not atomic; see the module docs.
    pub async fn post_message(
        &self,
        group_id: &str,
        sender: &str,
        sender_name: Option<String>,
        body: MessageBody,
    ) -> Result<Message> {
        let message = self
            .messages
            .send_to_group(group_id, sender, sender_name, body)
            .await?;

        let mut fields = Map::new();
        fields.insert("lastMessage".into(), Value::String(message.summary_text()));
        fields.insert("lastMessageTime".into(), Value::from(message.sent_at));

        let path = paths::group(group_id);
        let update = self.store.update(&path, fields);
        let result = match timeout(self.config.send_timeout, update).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::RemoteUnavailable(format!(
                "summary update timed out after {:?}",
                self.config.send_timeout
            ))),
        };
        match result {
            Ok(()) => Ok(message),
            Err(e) => Err(SyncError::PartialUpdateFailure {
                message: Box::new(message),
                reason: e.to_string(),
            }),
        }
    }

    /// Remove the group record entirely, embedded messages included.
    pub async fn delete(&self, group_id: &str) -> Result<()> {
        let path = paths::group(group_id);
        let remove = self.store.remove(&path);
        match timeout(self.config.send_timeout, remove).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::RemoteUnavailable(format!(
                "group removal timed out after {:?}",
                self.config.send_timeout
            ))),
        }
    }

    /// Watch a group record (name, members, summary fields).
    pub async fn observe(&self, group_id: &str) -> Result<GroupSubscription> {
        let inner = self.store.subscribe(&paths::group(group_id)).await?;
        Ok(GroupSubscription {
            group_id: group_id.to_string(),
            inner,
        })
    }
}

/// What a group subscription delivers on each change.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    Updated(Group),
    Removed,
}

pub struct GroupSubscription {
    group_id: String,
    inner: FeedSubscription,
}

impl GroupSubscription {
    pub async fn recv(&mut self) -> Option<GroupEvent> {
        loop {
            let snapshot = self.inner.recv().await?;
            if snapshot.is_null() {
                return Some(GroupEvent::Removed);
            }
            match Group::from_record(&self.group_id, &snapshot) {
                Ok(group) => return Some(GroupEvent::Updated(group)),
                Err(reason) => {
                    tracing::warn!(
                        "skipping malformed group snapshot {}: {}",
                        self.group_id,
                        reason
                    );
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}
