//! Text summary of the tracked party, one entry per display line.

use crate::core::state::{PartyInvite, PartyRole, PartyState, Timestamp};

pub const NOT_IN_PARTY: &str = "Not in a party";

pub fn summary_lines(
    state: Option<&PartyState>,
    invites: &[PartyInvite],
    now: Timestamp,
    max_invites: usize,
) -> Vec<String> {
    let Some(state) = state else {
        return vec![NOT_IN_PARTY.to_string()];
    };

    let mut lines = Vec::new();

    let leader = state
        .leader
        .as_ref()
        .map_or("Unknown", |l| l.display_name.as_str());
    lines.push(format!("Leader: {}", leader));
    lines.push(format!("Size: {}", state.size()));

    let others: Vec<&str> = state
        .members
        .values()
        .filter(|m| m.role != PartyRole::Leader)
        .map(|m| m.display_name.as_str())
        .collect();
    if !others.is_empty() {
        lines.push("Members:".to_string());
        lines.push(others.join(", "));
    }

    if !invites.is_empty() && max_invites > 0 {
        lines.push("Invites:".to_string());
        for invite in invites.iter().take(max_invites) {
            let secs_left = (invite.expires_at - now).num_seconds().max(0);
            let line = if invite.outgoing {
                format!("-> {} ({}s)", invite.to, secs_left)
            } else {
                format!("<- {} ({}s)", invite.from, secs_left)
            };
            lines.push(line);
        }
    }

    lines
}
