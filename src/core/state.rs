//! Party data model
//!
//! Plain values describing the local player's party. The tracker owns the live
//! copy; everything handed out (events, queries) is a clone.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Wall-clock instant supplied by the caller
pub type Timestamp = DateTime<Utc>;

/// Server-side invite timeout
pub const INVITE_LIFETIME_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartyRole {
    Leader,
    Moderator,
    Member,
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartyRole::Leader => "leader",
            PartyRole::Moderator => "moderator",
            PartyRole::Member => "member",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyMember {
    pub name: String,         // Plain username ("SoulReturns")
    pub display_name: String, // As printed in chat ("[MVP+] SoulReturns")
    pub role: PartyRole,
}

impl PartyMember {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, role: PartyRole) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            role,
        }
    }

    /// Lowercased username, the key used in [`PartyState::members`]
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn with_role(&self, role: PartyRole) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyInvite {
    pub from: String,
    pub to: String,
    pub outgoing: bool, // true if the local player sent it
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl PartyInvite {
    pub fn new(from: impl Into<String>, to: impl Into<String>, outgoing: bool, now: Timestamp) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            outgoing,
            created_at: now,
            expires_at: now + Duration::seconds(INVITE_LIFETIME_SECS),
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    pub fn involves(&self, username: &str) -> bool {
        self.from.eq_ignore_ascii_case(username) || self.to.eq_ignore_ascii_case(username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyState {
    pub leader: Option<PartyMember>,
    /// Keyed by lowercased username; includes the leader
    pub members: BTreeMap<String, PartyMember>,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

impl PartyState {
    /// Party with a known leader and no other members yet
    pub fn led_by(leader: PartyMember, now: Timestamp) -> Self {
        let mut members = BTreeMap::new();
        members.insert(leader.key(), leader.clone());
        Self {
            leader: Some(leader),
            members,
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, username: &str) -> Option<&PartyMember> {
        self.members.get(&username.to_lowercase())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.members.contains_key(&username.to_lowercase())
    }

    pub fn is_leader(&self, username: &str) -> bool {
        self.leader
            .as_ref()
            .is_some_and(|leader| leader.name.eq_ignore_ascii_case(username))
    }

    /// Insert or replace a member
    pub fn upsert(&mut self, member: PartyMember) {
        self.members.insert(member.key(), member);
    }

    pub fn remove(&mut self, username: &str) -> Option<PartyMember> {
        self.members.remove(&username.to_lowercase())
    }

    /// Same leader and roster, ignoring timestamps
    pub fn same_roster(&self, other: &PartyState) -> bool {
        self.leader == other.leader && self.members == other.members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartyDisbandReason {
    LeaderDisbanded,
    EmptyOrExpired,
    LeftParty,
    Kicked,
    Unknown,
}

impl fmt::Display for PartyDisbandReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PartyDisbandReason::LeaderDisbanded => "leader disbanded",
            PartyDisbandReason::EmptyOrExpired => "empty or invites expired",
            PartyDisbandReason::LeftParty => "left party",
            PartyDisbandReason::Kicked => "kicked",
            PartyDisbandReason::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Something that changed in the tracked party
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PartyEvent {
    PartyJoined {
        state: PartyState,
        joined_as_leader: bool,
    },
    PartyLeft {
        previous_state: PartyState,
        reason: PartyDisbandReason,
    },
    PartyDisbanded {
        previous_state: PartyState,
        reason: PartyDisbandReason,
    },
    MemberJoined {
        member: PartyMember,
        new_state: PartyState,
    },
    MemberLeft {
        member_name: String,
        new_state: Option<PartyState>,
    },
    MemberKicked {
        member_name: String,
        by: Option<String>,
        new_state: Option<PartyState>,
    },
    InviteReceived {
        invite: PartyInvite,
    },
    InviteSent {
        invite: PartyInvite,
    },
    InviteExpired {
        invite: PartyInvite,
    },
    PartySyncedFromList {
        state: PartyState,
    },
    /// Promotion, demotion or leadership transfer
    RoleChanged {
        member: PartyMember,
        old_role: PartyRole,
        new_role: PartyRole,
    },
}

impl PartyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PartyEvent::PartyJoined { .. } => "PartyJoined",
            PartyEvent::PartyLeft { .. } => "PartyLeft",
            PartyEvent::PartyDisbanded { .. } => "PartyDisbanded",
            PartyEvent::MemberJoined { .. } => "MemberJoined",
            PartyEvent::MemberLeft { .. } => "MemberLeft",
            PartyEvent::MemberKicked { .. } => "MemberKicked",
            PartyEvent::InviteReceived { .. } => "InviteReceived",
            PartyEvent::InviteSent { .. } => "InviteSent",
            PartyEvent::InviteExpired { .. } => "InviteExpired",
            PartyEvent::PartySyncedFromList { .. } => "PartySyncedFromList",
            PartyEvent::RoleChanged { .. } => "RoleChanged",
        }
    }
}

impl fmt::Display for PartyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyEvent::PartyJoined { state, joined_as_leader } => {
                let leader = state.leader.as_ref().map_or("?", |l| l.name.as_str());
                if *joined_as_leader {
                    write!(f, "created party (size {})", state.size())
                } else {
                    write!(f, "joined {}'s party (size {})", leader, state.size())
                }
            }
            PartyEvent::PartyLeft { reason, .. } => write!(f, "left party ({})", reason),
            PartyEvent::PartyDisbanded { reason, .. } => write!(f, "party disbanded ({})", reason),
            PartyEvent::MemberJoined { member, new_state } => {
                write!(f, "{} joined (size {})", member.name, new_state.size())
            }
            PartyEvent::MemberLeft { member_name, .. } => write!(f, "{} left", member_name),
            PartyEvent::MemberKicked { member_name, by, .. } => match by {
                Some(by) => write!(f, "{} was kicked by {}", member_name, by),
                None => write!(f, "{} was removed", member_name),
            },
            PartyEvent::InviteReceived { invite } => write!(f, "invite from {}", invite.from),
            PartyEvent::InviteSent { invite } => {
                write!(f, "{} invited {}", invite.from, invite.to)
            }
            PartyEvent::InviteExpired { invite } => {
                write!(f, "invite {} -> {} expired", invite.from, invite.to)
            }
            PartyEvent::PartySyncedFromList { state } => {
                write!(f, "synced from party list (size {})", state.size())
            }
            PartyEvent::RoleChanged {
                member,
                old_role,
                new_role,
            } => write!(f, "{}: {} -> {}", member.name, old_role, new_role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_invite_lifetime() {
        let invite = PartyInvite::new("Thyla", "SoulReturns", false, t0());
        assert_eq!(invite.expires_at - invite.created_at, Duration::seconds(60));
        assert!(!invite.is_expired(t0() + Duration::seconds(59)));
        assert!(invite.is_expired(t0() + Duration::seconds(60)));
    }

    #[test]
    fn test_invite_involves_is_case_insensitive() {
        let invite = PartyInvite::new("Thyla", "SoulReturns", false, t0());
        assert!(invite.involves("thyla"));
        assert!(invite.involves("SOULRETURNS"));
        assert!(!invite.involves("Bob"));
    }

    #[test]
    fn test_state_keys_are_lowercase() {
        let mut state = PartyState::led_by(PartyMember::new("Thyla", "[MVP+] Thyla", PartyRole::Leader), t0());
        state.upsert(PartyMember::new("Bob", "[VIP] Bob", PartyRole::Member));

        assert_eq!(state.size(), 2);
        assert!(state.contains("BOB"));
        assert!(state.is_leader("thyla"));
        assert_eq!(state.member("bob").map(|m| m.role), Some(PartyRole::Member));
        assert!(state.remove("bOb").is_some());
        assert_eq!(state.size(), 1);
    }

    #[test]
    fn test_event_display() {
        let invite = PartyInvite::new("Thyla", "SoulReturns", false, t0());
        assert_eq!(PartyEvent::InviteReceived { invite }.to_string(), "invite from Thyla");

        let event = PartyEvent::RoleChanged {
            member: PartyMember::new("Bob", "Bob", PartyRole::Moderator),
            old_role: PartyRole::Member,
            new_role: PartyRole::Moderator,
        };
        assert_eq!(event.to_string(), "Bob: member -> moderator");
        assert_eq!(event.name(), "RoleChanged");
    }
}
