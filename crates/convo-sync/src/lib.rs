//! Conversation synchronization core.
//!
//! Turns the raw key-value change-feed of an external realtime backend
//! into ordered, deduplicated per-conversation message streams, plus the
//! surrounding pieces a chat client needs: typing presence, a merged
//! recency-sorted conversation listing, and group membership.
//!
//! Everything here speaks to the backend through the [`FeedStore`] trait
//! from `convo-store`; no component owns a connection singleton. The
//! in-memory store from that crate doubles as the test backend.
//!
//! ```no_run
//! # async fn demo() -> convo_sync::Result<()> {
//! use std::sync::Arc;
//! use convo_store::MemoryStore;
//! use convo_sync::{ConversationId, MessageBody, MessageStore, SyncConfig, SystemClock};
//!
//! let store = Arc::new(MemoryStore::new());
//! let messages = MessageStore::new(store, Arc::new(SystemClock), SyncConfig::default());
//!
//! let conversation = ConversationId::derive("u1", "u2")?;
//! let mut sub = messages.open(&conversation).await?;
//! messages
//!     .send(&conversation, "u1", "u2", MessageBody::text("hi"))
//!     .await?;
//! let snapshot = sub.recv().await; // ordered, full snapshot
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod groups;
pub mod identity;
pub mod index;
pub mod message_store;
pub mod models;
pub mod paths;
pub mod typing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use directory::{AuthProvider, MemoryDirectory, StaticAuth, UserDirectory};
pub use error::{Result, SyncError};
pub use groups::{GroupEvent, GroupMembership, GroupSubscription};
pub use identity::ConversationId;
pub use index::{ConversationIndex, IndexSubscription};
pub use message_store::{MessageStore, MessageSubscription};
pub use models::{
    ConversationKind, ConversationSummary, Group, Message, MessageBody, UserProfile,
    LOCATION_PLACEHOLDER, MAX_GROUP_NAME_LEN,
};
pub use typing::{TypingPresence, TypingSubscription};
