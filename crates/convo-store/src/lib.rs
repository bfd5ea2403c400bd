//! Abstract change-feed store contract.
//!
//! A conversation backend is modeled as a tree of JSON values addressed by
//! slash paths. Subscribers receive the full current snapshot of their
//! subtree on every change (push model, no polling). The [`FeedStore`]
//! trait is the seam between the sync core and whatever managed backend
//! actually holds the data; [`MemoryStore`] is the in-process reference
//! implementation used by tests and local tooling.

pub mod keys;
pub mod memory;
pub mod path;
pub mod store;

pub use keys::KeyGenerator;
pub use memory::MemoryStore;
pub use path::FeedPath;
pub use store::{FeedSnapshotSender, FeedStore, FeedSubscription, Result, StoreError};
