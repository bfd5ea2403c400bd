//! Feed tree layout.
//!
//! ```text
//! conversations/{conversationId}/messages/{messageId}
//! conversations/{conversationId}/{participantId}_typing
//! groups/{groupId}                  (members, lastMessage, ...)
//! groups/{groupId}/messages/{messageId}
//! ```

use crate::identity::ConversationId;
use convo_store::FeedPath;

pub const CONVERSATIONS: &str = "conversations";
pub const GROUPS: &str = "groups";
pub const MESSAGES: &str = "messages";
const TYPING_SUFFIX: &str = "_typing";

pub fn conversations_root() -> FeedPath {
    FeedPath::new([CONVERSATIONS])
}

pub fn conversation(id: &ConversationId) -> FeedPath {
    conversations_root().child(id.as_str())
}

pub fn conversation_messages(id: &ConversationId) -> FeedPath {
    conversation(id).child(MESSAGES)
}

pub fn typing_flag(id: &ConversationId, participant: &str) -> FeedPath {
    conversation(id).child(format!("{participant}{TYPING_SUFFIX}"))
}

pub fn groups_root() -> FeedPath {
    FeedPath::new([GROUPS])
}

pub fn group(group_id: &str) -> FeedPath {
    groups_root().child(group_id)
}

pub fn group_messages(group_id: &str) -> FeedPath {
    group(group_id).child(MESSAGES)
}

/// True for conversation-level keys that are typing flags rather than the
/// message collection.
pub fn is_typing_key(key: &str) -> bool {
    key.ends_with(TYPING_SUFFIX)
}
