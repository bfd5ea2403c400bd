//! Data model and the wire records it is parsed from.
//!
//! Feed records travel as loose JSON; parsing happens once, at the
//! ingestion boundary, into the strict types below. Field names on the
//! wire mirror the feed layout (`time`, `sender`, `receiver`, `msg`,
//! `type`, `location`; groups use camelCase).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Listing text shown for a location message instead of coordinates.
pub const LOCATION_PLACEHOLDER: &str = "📍 Position";

/// Upper bound on a group name, in characters.
pub const MAX_GROUP_NAME_LEN: usize = 50;

/// Message content: free text or a shared location. These are the only
/// kinds the feed carries.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(String),
    Location { latitude: f64, longitude: f64 },
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        MessageBody::Text(text.into())
    }

    /// One-line summary for listing screens.
    pub fn summary_text(&self) -> String {
        match self {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Location { .. } => LOCATION_PLACEHOLDER.to_string(),
        }
    }
}

/// One message, immutable once written. The id is the feed key assigned
/// at write time; ordering within a conversation is `(sent_at, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender: String,
    /// The other participant for direct messages; absent in groups.
    pub recipient: Option<String>,
    /// Display name captured at send time for group rendering.
    pub sender_name: Option<String>,
    pub body: MessageBody,
    /// Milliseconds since the Unix epoch, assigned at write time.
    pub sent_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMessage {
    time: i64,
    sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    receiver: Option<String>,
    #[serde(default)]
    msg: String,
    #[serde(rename = "type")]
    kind: String,
    // Present (possibly null) on every record the feed holds.
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(
        default,
        rename = "senderName",
        skip_serializing_if = "Option::is_none"
    )]
    sender_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
}

impl Message {
    /// Parse one feed record. The feed key becomes the message id.
    /// Returns the rejection reason for records that do not conform;
    /// callers skip those with a warning rather than failing the stream.
    pub fn from_record(id: &str, record: &Value) -> Result<Message, String> {
        let raw: RawMessage =
            serde_json::from_value(record.clone()).map_err(|e| e.to_string())?;
        let body = match raw.kind.as_str() {
            "text" => MessageBody::Text(raw.msg),
            "location" => {
                let location = raw
                    .location
                    .ok_or_else(|| "location message without coordinates".to_string())?;
                MessageBody::Location {
                    latitude: location.latitude,
                    longitude: location.longitude,
                }
            }
            other => return Err(format!("unknown message kind {other:?}")),
        };
        Ok(Message {
            id: id.to_string(),
            sender: raw.sender,
            recipient: raw.receiver,
            sender_name: raw.sender_name,
            body,
            sent_at: raw.time,
        })
    }

    /// The wire shape written to the feed.
    pub fn to_record(&self) -> Value {
        let (kind, msg, location) = match &self.body {
            MessageBody::Text(text) => ("text", text.clone(), None),
            MessageBody::Location {
                latitude,
                longitude,
            } => (
                "location",
                LOCATION_PLACEHOLDER.to_string(),
                Some(RawLocation {
                    latitude: *latitude,
                    longitude: *longitude,
                }),
            ),
        };
        serde_json::to_value(RawMessage {
            time: self.sent_at,
            sender: self.sender.clone(),
            receiver: self.recipient.clone(),
            msg,
            kind: kind.to_string(),
            location,
            sender_name: self.sender_name.clone(),
        })
        .expect("message record serialization cannot fail")
    }

    pub fn summary_text(&self) -> String {
        self.body.summary_text()
    }
}

/// A group thread. The member set is fixed at creation; the summary
/// fields are maintained incrementally on every post.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: i64,
    pub members: BTreeSet<String>,
    pub last_message: String,
    pub last_message_time: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroup {
    name: String,
    created_by: String,
    created_at: i64,
    /// Member set encoded as `{uid: true}` on the wire.
    members: HashMap<String, bool>,
    #[serde(default)]
    last_message: String,
    #[serde(default)]
    last_message_time: i64,
}

impl Group {
    pub fn from_record(id: &str, record: &Value) -> Result<Group, String> {
        let raw: RawGroup = serde_json::from_value(record.clone()).map_err(|e| e.to_string())?;
        let members: BTreeSet<String> = raw
            .members
            .into_iter()
            .filter_map(|(uid, present)| present.then_some(uid))
            .collect();
        if members.is_empty() {
            return Err("group record with no members".to_string());
        }
        Ok(Group {
            id: id.to_string(),
            name: raw.name,
            created_by: raw.created_by,
            created_at: raw.created_at,
            members,
            last_message: raw.last_message,
            last_message_time: raw.last_message_time,
        })
    }

    pub fn to_record(&self) -> Value {
        serde_json::to_value(RawGroup {
            name: self.name.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            members: self
                .members
                .iter()
                .map(|uid| (uid.clone(), true))
                .collect(),
            last_message: self.last_message.clone(),
            last_message_time: self.last_message_time,
        })
        .expect("group record serialization cannot fail")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Direct,
    Group,
}

/// Derived, read-only projection for listing screens. Never persisted;
/// recomputed on every merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    /// Conversation id (direct) or group id.
    pub id: String,
    pub kind: ConversationKind,
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
    pub last_message: String,
    pub last_message_time: i64,
}

/// Directory profile of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
