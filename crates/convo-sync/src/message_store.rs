//! Live, ordered view of one conversation's messages.
//!
//! A [`MessageStore`] owns no state of its own: every delivery is a full
//! re-read of the feed snapshot, normalized and sorted. Consumers replace
//! their view on each delivery, they never merge.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::identity::ConversationId;
use crate::models::{Message, MessageBody};
use crate::paths;
use convo_store::{FeedPath, FeedStore};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

pub struct MessageStore {
    store: Arc<dyn FeedStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl MessageStore {
    pub fn new(store: Arc<dyn FeedStore>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Start listening to a direct conversation. The first delivery is the
    /// current (possibly empty) snapshot.
    pub async fn open(&self, conversation: &ConversationId) -> Result<MessageSubscription> {
        self.open_at(paths::conversation_messages(conversation))
            .await
    }

    /// Start listening to a group's messages.
    pub async fn open_group(&self, group_id: &str) -> Result<MessageSubscription> {
        self.open_at(paths::group_messages(group_id)).await
    }

    async fn open_at(&self, path: FeedPath) -> Result<MessageSubscription> {
        let mut feed = self.store.subscribe(&path).await?;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let closed = Arc::new(AtomicBool::new(false));
        let closed_pump = closed.clone();

        let pump = tokio::spawn(async move {
            while let Some(snapshot) = feed.recv().await {
                let messages = normalize_snapshot(&snapshot);
                if closed_pump.load(Ordering::Acquire) {
                    break;
                }
                if tx.send(messages).await.is_err() {
                    break;
                }
            }
        });

        Ok(MessageSubscription { rx, closed, pump })
    }

    /// Append a message to a direct conversation. Validation happens
    /// before any store call; the returned message is the record as
    /// written (its `sent_at` is this store's clock at write time).
    pub async fn send(
        &self,
        conversation: &ConversationId,
        sender: &str,
        recipient: &str,
        body: MessageBody,
    ) -> Result<Message> {
        validate_body(&body)?;
        if !conversation.contains(sender) || !conversation.contains(recipient) {
            return Err(SyncError::InvalidParticipant(format!(
                "{sender} -> {recipient} does not match conversation {conversation}"
            )));
        }
        let parent = paths::conversation_messages(conversation);
        let message = Message {
            id: self.store.generate_key(&parent),
            sender: sender.to_string(),
            recipient: Some(recipient.to_string()),
            sender_name: None,
            body,
            sent_at: self.clock.now_ms(),
        };
        self.write_message(&parent, &message).await?;
        Ok(message)
    }

    /// Append a message to a group. Groups carry no recipient; the sender
    /// display name is denormalized into the record when known.
    pub async fn send_to_group(
        &self,
        group_id: &str,
        sender: &str,
        sender_name: Option<String>,
        body: MessageBody,
    ) -> Result<Message> {
        validate_body(&body)?;
        if sender.is_empty() {
            return Err(SyncError::InvalidParticipant("empty id".into()));
        }
        let parent = paths::group_messages(group_id);
        let message = Message {
            id: self.store.generate_key(&parent),
            sender: sender.to_string(),
            recipient: None,
            sender_name,
            body,
            sent_at: self.clock.now_ms(),
        };
        self.write_message(&parent, &message).await?;
        Ok(message)
    }

    async fn write_message(&self, parent: &FeedPath, message: &Message) -> Result<()> {
        let path = parent.child(&message.id);
        let write = self.store.write(&path, message.to_record());
        match timeout(self.config.send_timeout, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::RemoteUnavailable(format!(
                "send timed out after {:?}",
                self.config.send_timeout
            ))),
        }
    }
}

fn validate_body(body: &MessageBody) -> Result<()> {
    match body {
        MessageBody::Text(text) => {
            if text.trim().is_empty() {
                return Err(SyncError::EmptyMessage);
            }
        }
        MessageBody::Location {
            latitude,
            longitude,
        } => {
            let in_range = latitude.is_finite()
                && longitude.is_finite()
                && (-90.0..=90.0).contains(latitude)
                && (-180.0..=180.0).contains(longitude);
            if !in_range {
                return Err(SyncError::UnsupportedMessageKind(format!(
                    "location out of range: ({latitude}, {longitude})"
                )));
            }
        }
    }
    Ok(())
}

/// Normalize a raw feed snapshot into the ordered message list: feed keys
/// become ids, malformed records are skipped with a warning, the result
/// is sorted ascending by `(sent_at, id)` and free of duplicate ids.
pub fn normalize_snapshot(snapshot: &Value) -> Vec<Message> {
    let Some(records) = snapshot.as_object() else {
        return Vec::new();
    };
    let mut messages = Vec::with_capacity(records.len());
    for (key, record) in records {
        match Message::from_record(key, record) {
            Ok(message) => messages.push(message),
            Err(reason) => warn!("skipping malformed message record {}: {}", key, reason),
        }
    }
    messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
    messages.dedup_by(|a, b| a.id == b.id);
    messages
}

/// Stream of full message-list snapshots for one conversation.
pub struct MessageSubscription {
    rx: mpsc::Receiver<Vec<Message>>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl MessageSubscription {
    /// Next snapshot, or `None` once closed.
    pub async fn recv(&mut self) -> Option<Vec<Message>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let messages = self.rx.recv().await?;
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(messages)
    }

    /// Stop the subscription. Guaranteed: no delivery after this returns,
    /// including results of writes still in flight.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.pump.abort();
        self.rx.close();
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.pump.abort();
    }
}

impl Stream for MessageSubscription {
    type Item = Vec<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Vec<Message>>> {
        if self.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(messages)) => {
                if self.closed.load(Ordering::Acquire) {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(messages))
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_sorts_by_time_then_id_and_skips_garbage() {
        let snapshot = json!({
            "b": {"time": 100, "sender": "u1", "msg": "hi", "type": "text"},
            "a": {"time": 50, "sender": "u2", "msg": "yo", "type": "text"},
            "z": {"time": 100, "sender": "u2", "msg": "tie", "type": "text"},
            "junk": {"sender": "u2"},
        });
        let messages = normalize_snapshot(&snapshot);
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "z"]);
    }

    #[test]
    fn normalize_of_empty_snapshot_is_empty() {
        assert!(normalize_snapshot(&Value::Null).is_empty());
    }

    #[test]
    fn blank_text_is_rejected_locally() {
        assert!(matches!(
            validate_body(&MessageBody::text("   \n\t")),
            Err(SyncError::EmptyMessage)
        ));
        assert!(validate_body(&MessageBody::text("hi")).is_ok());
    }

    #[test]
    fn out_of_range_location_is_rejected() {
        assert!(matches!(
            validate_body(&MessageBody::Location {
                latitude: 91.0,
                longitude: 0.0
            }),
            Err(SyncError::UnsupportedMessageKind(_))
        ));
        assert!(validate_body(&MessageBody::Location {
            latitude: -45.0,
            longitude: 170.0
        })
        .is_ok());
    }
}
