//! Party state machine
//!
//! Feeds chat lines through the list parser and the routing table, applies the
//! resulting transition to the tracked party, and publishes what changed.

use crate::core::events::{EventSink, ListenerId};
use crate::core::invites::InviteTracker;
use crate::core::list_block::{self, ListBlock, ListBlockParser};
use crate::core::rules::{self, extract_username, PartyLine};
use crate::core::state::{
    PartyDisbandReason, PartyEvent, PartyInvite, PartyMember, PartyRole, PartyState, Timestamp,
};
use crate::parser::strip_color_codes;

/// Tracks the local player's party from chat
#[derive(Debug, Default)]
pub struct PartyTracker {
    local_player: Option<String>,
    state: Option<PartyState>,
    invites: InviteTracker,
    list_parser: ListBlockParser,
    sink: EventSink,
}

impl PartyTracker {
    pub fn new(local_player: Option<String>) -> Self {
        Self {
            local_player,
            ..Default::default()
        }
    }

    pub fn set_local_player(&mut self, name: Option<String>) {
        self.local_player = name;
    }

    pub fn local_player(&self) -> Option<&str> {
        self.local_player.as_deref()
    }

    // Listeners

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PartyEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.sink.subscribe(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.sink.unsubscribe(id)
    }

    // Queries

    pub fn is_in_party(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_leader(&self) -> bool {
        match (&self.state, &self.local_player) {
            (Some(state), Some(me)) => state.is_leader(me),
            _ => false,
        }
    }

    pub fn party_state(&self) -> Option<&PartyState> {
        self.state.as_ref()
    }

    pub fn leader(&self) -> Option<&PartyMember> {
        self.state.as_ref().and_then(|s| s.leader.as_ref())
    }

    pub fn members(&self, include_leader: bool) -> Vec<PartyMember> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        state
            .members
            .values()
            .filter(|m| include_leader || m.role != PartyRole::Leader)
            .cloned()
            .collect()
    }

    pub fn member_names(&self, include_leader: bool) -> Vec<String> {
        self.members(include_leader).into_iter().map(|m| m.name).collect()
    }

    pub fn party_size(&self) -> usize {
        self.state.as_ref().map_or(0, PartyState::size)
    }

    /// Outstanding invites, after dropping (and publishing) expired ones
    pub fn pending_invites(&mut self, now: Timestamp) -> Vec<PartyInvite> {
        let mut out = Vec::new();
        self.prune_invites(now, &mut out);
        self.publish(&out);
        self.invites.pending().to_vec()
    }

    // Ingestion

    /// Process one chat line (server or player). Returns the events published.
    pub fn handle_message(&mut self, raw: &str, now: Timestamp) -> Vec<PartyEvent> {
        let stripped = strip_color_codes(raw);
        let clean = stripped.trim();
        if clean.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        self.prune_invites(now, &mut out);
        self.apply_line(clean, now, &mut out);
        self.publish(&out);
        out
    }

    fn apply_line(&mut self, clean: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        if list_block::is_list_header(clean) || self.list_parser.is_accumulating() {
            if let Some(block) = self.list_parser.feed(clean) {
                self.apply_list_block(block, now, out);
            }
            if !clean.to_lowercase().contains("party") {
                return;
            }
        }

        if !rules::is_potential_party_message(clean) {
            return;
        }

        let Some((rule, line)) = rules::route(clean) else {
            return;
        };
        tracing::trace!(rule = rule.name, "Party line matched");

        match line {
            PartyLine::InviteReceived { inviter } => self.on_invite_received(&inviter, now, out),
            PartyLine::InviteReceivedNamed { inviter, .. } => {
                self.on_invite_received(&inviter, now, out)
            }
            PartyLine::InviteSent { inviter, target } => {
                self.on_invite_sent(&inviter, &target, now, out)
            }
            PartyLine::Joined { leader } => self.on_joined(&leader, now, out),
            PartyLine::PartyingWith { members } => self.on_partying_with(&members, now),
            PartyLine::YouLeft => self.on_you_left(out),
            PartyLine::MemberJoined { member } => self.on_member_joined(&member, now, out),
            PartyLine::MemberLeft { member } => self.on_member_left(&member, now, out),
            PartyLine::MemberRemoved { member } => self.on_member_removed(&member, now, out),
            PartyLine::YouKicked { by } => self.on_you_kicked(&by, out),
            PartyLine::DisbandedBy { leader } => {
                tracing::debug!("Party disbanded by {}", leader);
                self.dissolve(PartyDisbandReason::LeaderDisbanded, out);
            }
            PartyLine::DisbandedEmpty => {
                tracing::debug!("Party disbanded because it was empty or all invites expired");
                self.dissolve(PartyDisbandReason::EmptyOrExpired, out);
            }
            PartyLine::PromotedToModerator { target, .. } => {
                self.apply_role(&target, PartyRole::Moderator, now, out)
            }
            PartyLine::PromotedToLeader { target, .. } => self.set_leader(&target, now, out),
            PartyLine::NowModerator { member } => {
                self.apply_role(&member, PartyRole::Moderator, now, out)
            }
            PartyLine::Transferred { to, .. } => self.set_leader(&to, now, out),
        }
    }

    fn publish(&self, events: &[PartyEvent]) {
        for event in events {
            self.sink.publish(event);
        }
    }

    fn prune_invites(&mut self, now: Timestamp, out: &mut Vec<PartyEvent>) {
        for invite in self.invites.prune(now) {
            tracing::debug!("Party invite from {} to {} expired", invite.from, invite.to);
            out.push(PartyEvent::InviteExpired { invite });
        }
    }

    // Invites

    fn on_invite_received(&mut self, inviter_display: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let Some(me) = self.local_player.clone() else {
            return;
        };
        let inviter = username_or_display(inviter_display);

        let invite = PartyInvite::new(inviter, me, false, now);
        tracing::debug!("Party invite received from {}", invite.from);
        self.invites.push(invite.clone());
        out.push(PartyEvent::InviteReceived { invite });
    }

    fn on_invite_sent(
        &mut self,
        inviter_display: &str,
        target_display: &str,
        now: Timestamp,
        out: &mut Vec<PartyEvent>,
    ) {
        let inviter = username_or_display(inviter_display);
        let target = username_or_display(target_display);
        let by_me = self.is_me(&inviter);

        let invite = PartyInvite::new(inviter.clone(), target, by_me, now);
        tracing::debug!("Party invite sent from {} to {}", invite.from, invite.to);
        self.invites.push(invite.clone());
        out.push(PartyEvent::InviteSent { invite });

        // Inviting someone implies we lead a party, even if we missed its creation
        if by_me && self.state.is_none() {
            let me = PartyMember::new(inviter, inviter_display, PartyRole::Leader);
            let state = PartyState::led_by(me, now);
            tracing::debug!("Created party with self as leader");
            self.state = Some(state.clone());
            out.push(PartyEvent::PartyJoined {
                state,
                joined_as_leader: true,
            });
        }
    }

    // Join / leave

    fn on_joined(&mut self, leader_display: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let Some(me) = self.local_player.clone() else {
            return;
        };
        let leader_name = username_or_display(leader_display);

        self.invites.clear_involving(&me);

        let joined_as_leader = leader_name.eq_ignore_ascii_case(&me);
        let mut state = PartyState::led_by(
            PartyMember::new(leader_name.as_str(), leader_display, PartyRole::Leader),
            now,
        );
        if !joined_as_leader {
            state.upsert(PartyMember::new(me.as_str(), me.as_str(), PartyRole::Member));
        }

        let previous = self.state.replace(state.clone());
        tracing::debug!("Joined party led by {} (size={})", leader_name, state.size());
        out.push(PartyEvent::PartyJoined {
            state: state.clone(),
            joined_as_leader,
        });

        if let Some(previous) = previous {
            if !previous.same_roster(&state) {
                out.push(PartyEvent::PartyLeft {
                    previous_state: previous,
                    reason: PartyDisbandReason::LeftParty,
                });
            }
        }
    }

    fn on_partying_with(&mut self, displays: &[String], now: Timestamp) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        for display_name in displays {
            let name = username_or_display(display_name);
            if state.contains(&name) {
                continue;
            }
            let role = if state.is_leader(&name) {
                PartyRole::Leader
            } else {
                PartyRole::Member
            };
            state.upsert(PartyMember::new(name, display_name.as_str(), role));
        }
        state.last_updated_at = now;
        tracing::debug!("Backfilled party roster (size={})", state.size());
    }

    fn on_you_left(&mut self, out: &mut Vec<PartyEvent>) {
        let Some(previous) = self.state.take() else {
            return;
        };
        tracing::debug!("Left party (prev size={})", previous.size());
        out.push(PartyEvent::PartyLeft {
            previous_state: previous.clone(),
            reason: PartyDisbandReason::LeftParty,
        });
        out.push(PartyEvent::PartyDisbanded {
            previous_state: previous,
            reason: PartyDisbandReason::LeftParty,
        });
    }

    fn on_member_joined(&mut self, display_name: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let name = username_or_display(display_name);

        // Any invite to or from them is settled now
        self.invites.clear_involving(&name);

        let Some(state) = self.state.as_mut() else {
            // Missed the party's creation: assume they lead and we follow
            let Some(me) = self.local_player.clone() else {
                return;
            };
            let leader = PartyMember::new(name.as_str(), display_name, PartyRole::Leader);
            let mut state = PartyState::led_by(leader.clone(), now);
            if !name.eq_ignore_ascii_case(&me) {
                state.upsert(PartyMember::new(me.as_str(), me.as_str(), PartyRole::Member));
            }
            tracing::debug!("Inferred new party with leader {} from join message", name);
            self.state = Some(state.clone());
            out.push(PartyEvent::PartyJoined {
                state: state.clone(),
                joined_as_leader: false,
            });
            out.push(PartyEvent::MemberJoined {
                member: leader,
                new_state: state,
            });
            return;
        };

        if state.contains(&name) {
            return;
        }

        let role = if state.is_leader(&name) {
            PartyRole::Leader
        } else {
            PartyRole::Member
        };
        let member = PartyMember::new(name, display_name, role);
        state.upsert(member.clone());
        state.last_updated_at = now;
        tracing::debug!("Party member joined: {} (size={})", display_name, state.size());
        out.push(PartyEvent::MemberJoined {
            member,
            new_state: state.clone(),
        });
    }

    fn on_member_left(&mut self, display_name: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let name = username_or_display(display_name);
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let removed = state.remove(&name);
        state.last_updated_at = now;
        let now_empty = state.members.is_empty();

        if removed.is_some() {
            tracing::debug!("Party member left: {} (remaining={})", display_name, state.size());
            out.push(PartyEvent::MemberLeft {
                member_name: name,
                new_state: (!now_empty).then(|| state.clone()),
            });
        }

        let leader_left = removed.is_some_and(|m| m.role == PartyRole::Leader);
        if leader_left || now_empty {
            self.dissolve(PartyDisbandReason::LeftParty, out);
        }
    }

    fn on_member_removed(&mut self, display_name: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let name = username_or_display(display_name);
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let removed = state.remove(&name);
        state.last_updated_at = now;
        let now_empty = state.members.is_empty();

        if removed.is_some() {
            tracing::debug!("Party member removed: {} (remaining={})", display_name, state.size());
            out.push(PartyEvent::MemberKicked {
                member_name: name,
                by: None,
                new_state: (!now_empty).then(|| state.clone()),
            });
        }

        if now_empty {
            self.dissolve(PartyDisbandReason::Kicked, out);
        }
    }

    fn on_you_kicked(&mut self, by_display: &str, out: &mut Vec<PartyEvent>) {
        if self.state.is_none() {
            return;
        }
        let by = username_or_display(by_display);
        tracing::debug!("Kicked from party by {}", by_display);
        out.push(PartyEvent::MemberKicked {
            member_name: self.local_player.clone().unwrap_or_else(|| "You".to_string()),
            by: Some(by),
            new_state: None,
        });
        self.dissolve(PartyDisbandReason::Kicked, out);
    }

    /// Drop the party, reporting the state it had
    fn dissolve(&mut self, reason: PartyDisbandReason, out: &mut Vec<PartyEvent>) {
        if let Some(previous) = self.state.take() {
            out.push(PartyEvent::PartyDisbanded {
                previous_state: previous,
                reason,
            });
        }
    }

    // Roles

    /// Set a non-leader role, creating the member if unknown
    fn apply_role(&mut self, display_name: &str, role: PartyRole, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let name = username_or_display(display_name);
        let Some(state) = self.state.as_mut() else {
            return;
        };
        // Leadership only moves through promotion to leader or transfer
        if state.is_leader(&name) {
            return;
        }

        let existing = state
            .member(&name)
            .cloned()
            .unwrap_or_else(|| PartyMember::new(name.as_str(), display_name, PartyRole::Member));
        // A repeated promotion is still reported, as Moderator -> Moderator
        let updated = PartyMember {
            role,
            display_name: display_name.to_string(),
            ..existing.clone()
        };

        state.upsert(updated.clone());
        state.last_updated_at = now;
        tracing::debug!("{} is now {}", updated.name, role);
        out.push(PartyEvent::RoleChanged {
            member: updated,
            old_role: existing.role,
            new_role: role,
        });
    }

    /// Make `display_name` the leader and demote the previous leader to moderator
    fn set_leader(&mut self, display_name: &str, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let name = username_or_display(display_name);
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let existing = state
            .member(&name)
            .cloned()
            .unwrap_or_else(|| PartyMember::new(name.as_str(), display_name, PartyRole::Member));
        let old_role = existing.role;
        let new_leader = PartyMember {
            role: PartyRole::Leader,
            display_name: display_name.to_string(),
            ..existing
        };

        if let Some(previous) = state.leader.clone() {
            if !previous.name.eq_ignore_ascii_case(&name) {
                let prev_member = state.member(&previous.name).cloned().unwrap_or(previous);
                let demoted = prev_member.with_role(PartyRole::Moderator);
                state.upsert(demoted.clone());
                tracing::debug!("{} demoted to moderator", demoted.name);
                out.push(PartyEvent::RoleChanged {
                    member: demoted,
                    old_role: prev_member.role,
                    new_role: PartyRole::Moderator,
                });
            }
        }

        state.upsert(new_leader.clone());
        state.leader = Some(new_leader.clone());
        state.last_updated_at = now;

        if old_role != PartyRole::Leader {
            tracing::debug!("{} is now party leader", new_leader.name);
            out.push(PartyEvent::RoleChanged {
                member: new_leader,
                old_role,
                new_role: PartyRole::Leader,
            });
        }
    }

    // List resync

    fn apply_list_block(&mut self, block: ListBlock, now: Timestamp, out: &mut Vec<PartyEvent>) {
        let created_at = self.state.as_ref().map_or(now, |s| s.created_at);
        let mut state = PartyState::led_by(block.leader, now);
        state.created_at = created_at;
        for member in block.members {
            state.upsert(member);
        }

        match block.expected_size {
            Some(expected) if expected != state.size() => tracing::debug!(
                "Party list size mismatch: header said {}, parsed {}",
                expected,
                state.size()
            ),
            _ => {}
        }
        tracing::debug!("Party state synced from list (size={})", state.size());

        self.state = Some(state.clone());
        out.push(PartyEvent::PartySyncedFromList { state });
    }

    fn is_me(&self, username: &str) -> bool {
        self.local_player
            .as_deref()
            .is_some_and(|me| me.eq_ignore_ascii_case(username))
    }
}

fn username_or_display(display_name: &str) -> String {
    let name = extract_username(display_name);
    if name.is_empty() {
        display_name.trim().to_string()
    } else {
        name
    }
}
