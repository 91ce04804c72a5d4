//! Chat line normalization and classification.
//!
//! Game text arrives with `§x` formatting codes embedded. Everything downstream
//! works on the stripped text. The classifier decides whether a line was typed
//! by a player (public, party, guild chat) or printed by the server.

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;

/// Marker character that starts a formatting code
pub const FORMAT_MARKER: char = '§';

/// Who authored a chat line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Server,
    Player,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Server => "server",
            MessageKind::Player => "player",
        }
    }
}

fn is_format_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r')
}

/// Remove `§x` formatting codes.
///
/// A code that only appears once an inner code is removed (`"§§aa"`) is
/// removed as well, so stripping twice never changes the result.
pub fn strip_color_codes(text: &str) -> Cow<'_, str> {
    if !text.contains(FORMAT_MARKER) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if out.ends_with(FORMAT_MARKER) && is_format_code(c) {
            out.pop();
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Pattern-based player/server classifier.
///
/// Rules are checked in priority order; anything unrecognized is a server line.
pub struct ChatClassifier {
    channel_prefixes: AhoCorasick,
    rank_colon: Regex,
    lobby_rank_colon: Regex,
    name_colon: Regex,
    announcement: Regex,
    channel_sender: Regex,
    lobby_sender: Regex,
}

impl ChatClassifier {
    pub fn new() -> Result<Self> {
        let channel_prefixes = AhoCorasick::new(["Party >", "Guild >", "Officer >"])
            .context("Failed to build chat channel matcher")?;

        Ok(Self {
            channel_prefixes,
            rank_colon: compile(r"(?i)^.*\[(VIP|MVP|MOD|ADMIN|HELPER|YOUTUBE|PIG).*?\].*:.*$")?,
            lobby_rank_colon: compile(r"^.*\[[0-9]+\].*\[.*?\].*:.*$")?,
            name_colon: compile(r"^.*[a-zA-Z0-9_]{3,16}\s*:.*$")?,
            announcement: compile(
                r"(?i)^[^a-zA-Z0-9]*(?:DOUBLE|TRIPLE|RARE|LEGENDARY|SPECIAL|EVENT).*$",
            )?,
            channel_sender: compile(r"(?:Party|Guild|Officer) > (?:\[.*?\] )?([a-zA-Z0-9_]+)\s*:")?,
            lobby_sender: compile(r"(?:\[[0-9]+\] )?(?:\[.*?\] )?([a-zA-Z0-9_]+)\s*:")?,
        })
    }

    /// Classify a raw line (formatting codes allowed)
    pub fn classify(&self, raw: &str) -> MessageKind {
        if self.is_player_message(raw) {
            MessageKind::Player
        } else {
            MessageKind::Server
        }
    }

    pub fn is_player_message(&self, message: &str) -> bool {
        let stripped = strip_color_codes(message);
        let line = stripped.as_ref();

        // Party / guild / officer chat channels
        if self.channel_prefixes.is_match(line) {
            return true;
        }

        // "[MVP+] Name: hello"
        if self.rank_colon.is_match(line) {
            return true;
        }

        // "[505] [VIP] Name: hello"
        if self.lobby_rank_colon.is_match(line) {
            return true;
        }

        // "Name: hello", unless it reads like a drop/catch announcement
        self.name_colon.is_match(line) && !self.announcement.is_match(line)
    }

    /// Case-sensitive or insensitive substring test on the stripped text
    pub fn contains_pattern(message: &str, pattern: &str, ignore_case: bool) -> bool {
        let stripped = strip_color_codes(message);
        if ignore_case {
            stripped.to_lowercase().contains(&pattern.to_lowercase())
        } else {
            stripped.contains(pattern)
        }
    }

    /// Sender name of a chat line, if one can be found
    pub fn extract_player_name(&self, message: &str) -> Option<String> {
        let stripped = strip_color_codes(message);

        [&self.channel_sender, &self.lobby_sender]
            .into_iter()
            .find_map(|re| re.captures(&stripped))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid classifier pattern: {}", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ChatClassifier {
        ChatClassifier::new().expect("classifier patterns compile")
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(strip_color_codes("§9Party §8> §6[MVP§3++§6] Foo§f: hi"), "Party > [MVP++] Foo: hi");
        assert_eq!(strip_color_codes("§Lbold §Rreset"), "bold reset");
        assert_eq!(strip_color_codes("no codes"), "no codes");
        // Not a formatting code
        assert_eq!(strip_color_codes("50§ off §z"), "50§ off §z");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let samples = [
            "§§aa",
            "§§§aaa§",
            "plain",
            "§a§b§cText§r",
            "§ §x§",
            "[§7505§r] §§6§6Name: §§",
        ];
        for s in samples {
            let once = strip_color_codes(s).into_owned();
            let twice = strip_color_codes(&once).into_owned();
            assert_eq!(once, twice, "strip not idempotent for {:?}", s);
        }
        assert_eq!(strip_color_codes("§§aa"), "");
    }

    #[test]
    fn test_channel_chat_is_player() {
        let c = classifier();
        assert!(c.is_player_message("Party > [MVP+] Foo: hi"));
        assert!(c.is_player_message("Guild > Foo: hello"));
        assert!(c.is_player_message("§3Officer > §7Bar: x"));
    }

    #[test]
    fn test_announcement_is_server() {
        let c = classifier();
        assert!(!c.is_player_message("Double Hook! Woot woot!"));
        assert!(!c.is_player_message("RARE DROP! Foo: bar"));
        assert!(!c.is_player_message("  LEGENDARY CATCH: Deep Sea Orb"));
        assert!(!c.is_player_message("You have joined [MVP+] Thyla's party!"));
    }

    #[test]
    fn test_rank_colon_outranks_announcement_exception() {
        let c = classifier();
        assert!(c.is_player_message("[MVP++] Foo: Double Hook!"));
        assert!(c.is_player_message("[vip] lower: case"));
    }

    #[test]
    fn test_lobby_prefix_is_player() {
        let c = classifier();
        assert!(c.is_player_message("[505] [Custom] Fo: hi"));
        assert!(c.is_player_message("§7[§a123§7] §6[MVP§c++§6] TestPlayer§f: hello"));
    }

    #[test]
    fn test_generic_name_colon() {
        let c = classifier();
        assert!(c.is_player_message("SomeName: hello"));
        // Token too short for the generic rule
        assert!(!c.is_player_message("ab: hi"));
        assert_eq!(c.classify("Thyla joined the party."), MessageKind::Server);
        assert_eq!(c.classify("Party > Foo: hi"), MessageKind::Player);
    }

    #[test]
    fn test_contains_pattern() {
        assert!(ChatClassifier::contains_pattern("§aDouble §bHook!", "double hook!", true));
        assert!(!ChatClassifier::contains_pattern("§aDouble §bHook!", "double hook!", false));
        assert!(ChatClassifier::contains_pattern("§aDouble §bHook!", "Double Hook!", false));
    }

    #[test]
    fn test_extract_player_name() {
        let c = classifier();
        assert_eq!(
            c.extract_player_name("Party > [MVP++] TestPlayer: hi"),
            Some("TestPlayer".to_string())
        );
        assert_eq!(
            c.extract_player_name("[123] [MVP++] TestPlayer: hi"),
            Some("TestPlayer".to_string())
        );
        assert_eq!(c.extract_player_name("Guild > Bob: x"), Some("Bob".to_string()));
        assert_eq!(c.extract_player_name("No sender here"), None);
    }
}
