//! Outstanding party invites.
//!
//! Invites expire on the server after a fixed time. Nothing is scheduled here:
//! expiry is observed lazily whenever the tracker is asked to prune.

use crate::core::state::{PartyInvite, Timestamp};

#[derive(Debug, Clone, Default)]
pub struct InviteTracker {
    pending: Vec<PartyInvite>,
}

impl InviteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, invite: PartyInvite) {
        self.pending.push(invite);
    }

    /// Remove and return every invite with `expires_at <= now`, oldest first
    pub fn prune(&mut self, now: Timestamp) -> Vec<PartyInvite> {
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|invite| invite.is_expired(now));
        self.pending = live;
        expired
    }

    /// Drop invites where `username` is either side. No events.
    pub fn clear_involving(&mut self, username: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|invite| !invite.involves(username));
        before - self.pending.len()
    }

    pub fn pending(&self) -> &[PartyInvite] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
