//! Party line routing table
//!
//! Each rule recognizes one server sentence shape and extracts its display
//! tokens. Rules are tried in table order and the first match wins.

use crate::core::list_block;

/// A recognized party sentence with the display tokens it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyLine {
    /// "X has invited you to join their party!"
    InviteReceived { inviter: String },
    /// "X has invited you to join Y's party!"
    InviteReceivedNamed { inviter: String, party_leader: String },
    /// "X invited Y to the party! They have 60 seconds to accept."
    InviteSent { inviter: String, target: String },
    /// "You have joined X's party!"
    Joined { leader: String },
    /// "You'll be partying with: A, B, C"
    PartyingWith { members: Vec<String> },
    YouLeft,
    MemberJoined { member: String },
    MemberLeft { member: String },
    MemberRemoved { member: String },
    YouKicked { by: String },
    DisbandedBy { leader: String },
    DisbandedEmpty,
    PromotedToModerator { by: String, target: String },
    PromotedToLeader { by: String, target: String },
    NowModerator { member: String },
    Transferred { to: String, by: String },
}

pub struct Rule {
    pub name: &'static str,
    pub parse: fn(&str) -> Option<PartyLine>,
}

pub const RULES: &[Rule] = &[
    Rule { name: "invite_received", parse: invite_received },
    Rule { name: "invite_received_named", parse: invite_received_named },
    Rule { name: "invite_sent", parse: invite_sent },
    Rule { name: "joined", parse: joined },
    Rule { name: "partying_with", parse: partying_with },
    Rule { name: "you_left", parse: you_left },
    Rule { name: "member_joined", parse: member_joined },
    Rule { name: "member_left", parse: member_left },
    Rule { name: "member_removed", parse: member_removed },
    Rule { name: "you_kicked", parse: you_kicked },
    Rule { name: "promoted_to_moderator", parse: promoted_to_moderator },
    Rule { name: "promoted_to_leader", parse: promoted_to_leader },
    Rule { name: "now_moderator", parse: now_moderator },
    Rule { name: "transferred", parse: transferred },
    Rule { name: "disbanded_by", parse: disbanded_by },
    Rule { name: "disbanded_empty", parse: disbanded_empty },
];

const INVITED_YOU_THEIR: &str = " has invited you to join their party!";
const INVITED_YOU_TO: &str = " has invited you to join ";
const INVITE_SENT_TAIL: &str = " to the party! They have 60 seconds to accept.";
const EMPTY_DISBAND: &str =
    "The party was disbanded because all invites expired and the party was empty.";

/// Cheap filter applied before routing
pub fn is_potential_party_message(line: &str) -> bool {
    line.to_lowercase().contains("party") || list_block::is_list_header(line)
}

/// Match a stripped, trimmed line against the table
pub fn route(line: &str) -> Option<(&'static Rule, PartyLine)> {
    RULES
        .iter()
        .find_map(|rule| (rule.parse)(line).map(|parsed| (rule, parsed)))
}

/// Plain username from a display token.
///
/// Rank and guild tags come first ("[MVP+] [GUILD] Name"), so the name is
/// whatever follows the last "] ", up to the next space.
pub fn extract_username(display: &str) -> String {
    let display = display.trim();
    if display.is_empty() {
        return String::new();
    }

    let tail = match display.rfind("] ") {
        Some(pos) => &display[pos + 2..],
        None => display,
    };
    tail.split(' ').next().unwrap_or(tail).to_string()
}

/// Text before the first `delimiter`, or all of it when absent
fn before<'a>(text: &'a str, delimiter: &str) -> &'a str {
    text.split_once(delimiter).map_or(text, |(head, _)| head)
}

/// Text after the first `delimiter`, or all of it when absent
fn after<'a>(text: &'a str, delimiter: &str) -> &'a str {
    text.split_once(delimiter).map_or(text, |(_, tail)| tail)
}

fn token(text: &str) -> String {
    text.trim().to_string()
}

fn invite_received(line: &str) -> Option<PartyLine> {
    let inviter = line.strip_suffix(INVITED_YOU_THEIR)?;
    Some(PartyLine::InviteReceived { inviter: token(inviter) })
}

fn invite_received_named(line: &str) -> Option<PartyLine> {
    if !line.contains(INVITED_YOU_TO) || !line.ends_with("'s party!") {
        return None;
    }
    let (inviter, rest) = line.split_once(INVITED_YOU_TO)?;
    let party_leader = rest.strip_suffix("'s party!").unwrap_or(rest);
    Some(PartyLine::InviteReceivedNamed {
        inviter: token(inviter),
        party_leader: token(party_leader),
    })
}

fn invite_sent(line: &str) -> Option<PartyLine> {
    if !line.contains(" invited ") || !line.ends_with(INVITE_SENT_TAIL) {
        return None;
    }
    let (inviter, rest) = line.split_once(" invited ")?;
    Some(PartyLine::InviteSent {
        inviter: token(inviter),
        target: token(before(rest, " to the party!")),
    })
}

fn joined(line: &str) -> Option<PartyLine> {
    let leader = line.strip_prefix("You have joined ")?.strip_suffix("'s party!")?;
    Some(PartyLine::Joined { leader: token(leader) })
}

fn partying_with(line: &str) -> Option<PartyLine> {
    let list = line.strip_prefix("You'll be partying with:")?;
    let members = list
        .split(", ")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    Some(PartyLine::PartyingWith { members })
}

fn you_left(line: &str) -> Option<PartyLine> {
    (line == "You left the party.").then_some(PartyLine::YouLeft)
}

fn member_joined(line: &str) -> Option<PartyLine> {
    let member = line.strip_suffix(" joined the party.")?;
    Some(PartyLine::MemberJoined { member: token(member) })
}

fn member_left(line: &str) -> Option<PartyLine> {
    let member = line.strip_suffix(" has left the party.")?;
    Some(PartyLine::MemberLeft { member: token(member) })
}

fn member_removed(line: &str) -> Option<PartyLine> {
    let member = line.strip_suffix(" has been removed from the party.")?;
    Some(PartyLine::MemberRemoved { member: token(member) })
}

fn you_kicked(line: &str) -> Option<PartyLine> {
    let by = line.strip_prefix("You have been kicked from the party by ")?;
    Some(PartyLine::YouKicked { by: token(by) })
}

fn disbanded_by(line: &str) -> Option<PartyLine> {
    let leader = line.strip_suffix(" has disbanded the party!")?;
    Some(PartyLine::DisbandedBy { leader: token(leader) })
}

fn disbanded_empty(line: &str) -> Option<PartyLine> {
    (line == EMPTY_DISBAND).then_some(PartyLine::DisbandedEmpty)
}

fn promoted(line: &str, suffix: &str) -> Option<(String, String)> {
    if !line.contains(" has promoted ") || !line.ends_with(suffix) {
        return None;
    }
    let by = before(line, " has promoted ");
    let target = before(after(line, " has promoted "), suffix);
    Some((token(by), token(target)))
}

fn promoted_to_moderator(line: &str) -> Option<PartyLine> {
    let (by, target) = promoted(line, " to Party Moderator")?;
    Some(PartyLine::PromotedToModerator { by, target })
}

fn promoted_to_leader(line: &str) -> Option<PartyLine> {
    let (by, target) = promoted(line, " to Party Leader")?;
    Some(PartyLine::PromotedToLeader { by, target })
}

fn now_moderator(line: &str) -> Option<PartyLine> {
    let member = line.strip_suffix(" is now a Party Moderator")?;
    Some(PartyLine::NowModerator { member: token(member) })
}

fn transferred(line: &str) -> Option<PartyLine> {
    let rest = line.strip_prefix("The party was transferred to ")?;
    Some(PartyLine::Transferred {
        to: token(before(rest, " by ")),
        by: token(after(rest, " by ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<PartyLine> {
        route(line).map(|(_, parsed)| parsed)
    }

    fn rule_name(line: &str) -> Option<&'static str> {
        route(line).map(|(rule, _)| rule.name)
    }

    #[test]
    fn test_extract_username() {
        assert_eq!(extract_username("[MVP+] Thyla"), "Thyla");
        assert_eq!(extract_username("[MVP++] [GUILD] Larry ●"), "Larry");
        assert_eq!(extract_username("Bob"), "Bob");
        assert_eq!(extract_username("  Bob extra "), "Bob");
        assert_eq!(extract_username(""), "");
    }

    #[test]
    fn test_gate() {
        assert!(is_potential_party_message("Thyla joined the PARTY."));
        assert!(is_potential_party_message("Party Leader: Foo"));
        assert!(!is_potential_party_message("Double Hook!"));
        assert!(!is_potential_party_message("-----"));
    }

    #[test]
    fn test_invites() {
        assert_eq!(
            parse("[MVP+] Thyla has invited you to join their party!"),
            Some(PartyLine::InviteReceived { inviter: "[MVP+] Thyla".into() })
        );
        assert_eq!(
            parse("[MVP++] LateNightLarry has invited you to join [MVP++] SoutifDeLuxe's party!"),
            Some(PartyLine::InviteReceivedNamed {
                inviter: "[MVP++] LateNightLarry".into(),
                party_leader: "[MVP++] SoutifDeLuxe".into(),
            })
        );
        assert_eq!(
            parse("[MVP+] SoulReturns invited [MVP+] Thyla to the party! They have 60 seconds to accept."),
            Some(PartyLine::InviteSent {
                inviter: "[MVP+] SoulReturns".into(),
                target: "[MVP+] Thyla".into(),
            })
        );
    }

    #[test]
    fn test_join_and_leave_shapes() {
        assert_eq!(
            parse("You have joined [MVP+] Thyla's party!"),
            Some(PartyLine::Joined { leader: "[MVP+] Thyla".into() })
        );
        assert_eq!(
            parse("You'll be partying with: [MVP++] LateNightLarry, [MVP+] danielcopter"),
            Some(PartyLine::PartyingWith {
                members: vec!["[MVP++] LateNightLarry".into(), "[MVP+] danielcopter".into()],
            })
        );
        assert_eq!(parse("You left the party."), Some(PartyLine::YouLeft));
        assert_eq!(rule_name("[VIP] Bob joined the party."), Some("member_joined"));
        assert_eq!(rule_name("[VIP] Bob has left the party."), Some("member_left"));
        assert_eq!(
            rule_name("[VIP] Bob has been removed from the party."),
            Some("member_removed")
        );
        assert_eq!(
            parse("You have been kicked from the party by [MVP+] Thyla"),
            Some(PartyLine::YouKicked { by: "[MVP+] Thyla".into() })
        );
    }

    #[test]
    fn test_disband_shapes() {
        assert_eq!(
            parse("[MVP+] Thyla has disbanded the party!"),
            Some(PartyLine::DisbandedBy { leader: "[MVP+] Thyla".into() })
        );
        assert_eq!(parse(EMPTY_DISBAND), Some(PartyLine::DisbandedEmpty));
    }

    #[test]
    fn test_role_shapes() {
        assert_eq!(
            parse("[MVP+] SoulReturns has promoted [MVP+] 20BurrowIgnis to Party Moderator"),
            Some(PartyLine::PromotedToModerator {
                by: "[MVP+] SoulReturns".into(),
                target: "[MVP+] 20BurrowIgnis".into(),
            })
        );
        assert_eq!(
            rule_name("[MVP+] SoulReturns has promoted [MVP+] 20BurrowIgnis to Party Leader"),
            Some("promoted_to_leader")
        );
        assert_eq!(
            parse("[MVP+] SoulReturns is now a Party Moderator"),
            Some(PartyLine::NowModerator { member: "[MVP+] SoulReturns".into() })
        );
        assert_eq!(
            parse("The party was transferred to [MVP+] SoulReturns by [MVP+] 20BurrowIgnis"),
            Some(PartyLine::Transferred {
                to: "[MVP+] SoulReturns".into(),
                by: "[MVP+] 20BurrowIgnis".into(),
            })
        );
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(parse("Party Members (2)"), None);
        assert_eq!(parse("Party > [MVP+] Foo: party time"), None);
        // Anchors are case-sensitive
        assert_eq!(parse("you left the party."), None);
    }

    #[test]
    fn test_rule_priority_order() {
        let order: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            order,
            vec![
                "invite_received",
                "invite_received_named",
                "invite_sent",
                "joined",
                "partying_with",
                "you_left",
                "member_joined",
                "member_left",
                "member_removed",
                "you_kicked",
                "promoted_to_moderator",
                "promoted_to_leader",
                "now_moderator",
                "transferred",
                "disbanded_by",
                "disbanded_empty",
            ]
        );
    }
}
