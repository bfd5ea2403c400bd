//! Canonical conversation identity.
//!
//! A direct conversation's id is a pure function of its two participant
//! ids: sort, then join. Both sides derive the same id without any
//! negotiation, which is what lets them share one message collection.

use crate::error::{Result, SyncError};
use std::fmt;

/// Separator between the two participant ids. Participant ids are
/// validated to never contain it, so decomposition is unambiguous.
pub const SEPARATOR: char = ':';

/// Identifier of a direct (two-participant) conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId {
    raw: String,
    split: usize,
}

impl ConversationId {
    /// Derive the id for a pair of participants. Commutative:
    /// `derive(a, b) == derive(b, a)`.
    pub fn derive(a: &str, b: &str) -> Result<Self> {
        validate_participant(a)?;
        validate_participant(b)?;
        if a == b {
            return Err(SyncError::InvalidParticipant(format!(
                "self-conversation not supported: {a}"
            )));
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            raw: format!("{first}{SEPARATOR}{second}"),
            split: first.len(),
        })
    }

    /// Reconstruct an id from a feed key. Returns `None` for keys that do
    /// not decompose into two valid, ordered participant ids.
    pub fn parse(raw: &str) -> Option<Self> {
        let (first, second) = raw.split_once(SEPARATOR)?;
        let id = Self::derive(first, second).ok()?;
        // Keys written by this core are always sorted; anything else is
        // not one of ours.
        (id.raw == raw).then_some(id)
    }

    /// The two participants, in lexicographic order.
    pub fn participants(&self) -> (&str, &str) {
        (&self.raw[..self.split], &self.raw[self.split + SEPARATOR.len_utf8()..])
    }

    /// The participant that is not `me`, when `me` is part of this
    /// conversation.
    pub fn peer_of(&self, me: &str) -> Option<&str> {
        let (a, b) = self.participants();
        if a == me {
            Some(b)
        } else if b == me {
            Some(a)
        } else {
            None
        }
    }

    pub fn contains(&self, participant: &str) -> bool {
        let (a, b) = self.participants();
        a == participant || b == participant
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn validate_participant(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SyncError::InvalidParticipant("empty id".into()));
    }
    if id.contains(SEPARATOR) {
        return Err(SyncError::InvalidParticipant(format!(
            "id contains reserved separator {SEPARATOR:?}: {id}"
        )));
    }
    Ok(())
}
