//! Seams to the external user directory and auth provider.

use crate::error::Result;
use crate::models::UserProfile;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read-only profile lookup, keyed by participant id. A missing profile
/// is `Ok(None)`; listings degrade per item instead of failing.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

/// The authenticated participant, as known to the auth provider.
pub trait AuthProvider: Send + Sync + 'static {
    fn current_participant(&self) -> Option<String>;
}

/// In-memory directory for tests and local tooling.
#[derive(Default)]
pub struct MemoryDirectory {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, profile: UserProfile) {
        self.profiles.write().insert(user_id.into(), profile);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }
}

/// Fixed-identity auth provider.
pub struct StaticAuth {
    participant: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(participant: impl Into<String>) -> Self {
        Self {
            participant: Some(participant.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { participant: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_participant(&self) -> Option<String> {
        self.participant.clone()
    }
}
