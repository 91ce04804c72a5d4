//! Incremental parser for the multi-line party list dump.
//!
//! ```text
//! -----------------------------------------------------
//! Party Members (3)
//!
//! Party Leader: [MVP+] SoulReturns ●
//! Party Moderators: [MVP+] Thyla ●
//! Party Members: [VIP] Bob ●
//! -----------------------------------------------------
//! ```
//!
//! Lines arrive one call at a time. The header starts accumulation, the dash
//! rule finishes it.

use crate::core::rules::extract_username;
use crate::core::state::{PartyMember, PartyRole};

const HEADER: &str = "Party Members (";
const LEADER_PREFIX: &str = "Party Leader:";
const MEMBERS_PREFIX: &str = "Party Members:";
const MODERATORS_PREFIX: &str = "Party Moderators:";
const BULLET: &str = " ●";

/// True for lines that open or belong to a list dump regardless of parser state
pub fn is_list_header(line: &str) -> bool {
    line.starts_with(HEADER) || line.starts_with(LEADER_PREFIX) || line.starts_with(MEMBERS_PREFIX)
}

/// A completed list dump. `members` includes the leader, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBlock {
    pub expected_size: Option<usize>,
    pub leader: PartyMember,
    pub members: Vec<PartyMember>,
}

#[derive(Debug, Clone, Default)]
struct ListBlockScratch {
    expected_size: Option<usize>,
    leader: Option<PartyMember>,
    members: Vec<PartyMember>,
}

impl ListBlockScratch {
    fn add_if_absent(&mut self, member: PartyMember) {
        if !self
            .members
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case(&member.name))
        {
            self.members.push(member);
        }
    }

    fn add_list(&mut self, section: &str, role: PartyRole) {
        for part in section.split(", ") {
            let display = clean_display(part);
            if display.is_empty() {
                continue;
            }
            self.add_if_absent(PartyMember::new(extract_username(display), display, role));
        }
    }

    fn finish(self) -> Option<ListBlock> {
        let leader = self.leader?;
        let members = self
            .members
            .into_iter()
            .map(|m| {
                if m.name.eq_ignore_ascii_case(&leader.name) {
                    m.with_role(PartyRole::Leader)
                } else if m.role == PartyRole::Leader {
                    // Replaced by a later leader line
                    m.with_role(PartyRole::Member)
                } else {
                    m
                }
            })
            .collect();

        Some(ListBlock {
            expected_size: self.expected_size,
            leader,
            members,
        })
    }
}

#[derive(Debug, Clone, Default)]
enum ListState {
    #[default]
    Idle,
    Accumulating(ListBlockScratch),
}

#[derive(Debug, Clone, Default)]
pub struct ListBlockParser {
    state: ListState,
}

impl ListBlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, ListState::Accumulating(_))
    }

    /// Feed one stripped, trimmed line. Returns the block on its terminator.
    pub fn feed(&mut self, line: &str) -> Option<ListBlock> {
        if let Some(rest) = line.strip_prefix(HEADER) {
            let expected_size = rest.split(')').next().and_then(|n| n.trim().parse().ok());
            self.state = ListState::Accumulating(ListBlockScratch {
                expected_size,
                ..Default::default()
            });
            return None;
        }

        let ListState::Accumulating(scratch) = &mut self.state else {
            return None;
        };

        if let Some(rest) = line.strip_prefix(LEADER_PREFIX) {
            let display = clean_display(rest);
            let leader = PartyMember::new(extract_username(display), display, PartyRole::Leader);
            scratch.add_if_absent(leader.clone());
            scratch.leader = Some(leader);
        } else if let Some(rest) = line.strip_prefix(MEMBERS_PREFIX) {
            scratch.add_list(rest, PartyRole::Member);
        } else if let Some(rest) = line.strip_prefix(MODERATORS_PREFIX) {
            scratch.add_list(rest, PartyRole::Moderator);
        } else if !line.is_empty() && line.chars().all(|c| c == '-') {
            let ListState::Accumulating(scratch) = std::mem::take(&mut self.state) else {
                return None;
            };
            let block = scratch.finish();
            if block.is_none() {
                tracing::debug!("Party list ended without a leader line, discarding");
            }
            return block;
        }

        None
    }
}

fn clean_display(part: &str) -> &str {
    let part = part.trim();
    part.strip_suffix(BULLET).unwrap_or(part).trim()
}
