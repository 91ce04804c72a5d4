use crate::config::Config;
use crate::core::events::ListenerId;
use crate::core::messages::MessageHandler;
use crate::core::party::PartyTracker;
use crate::core::state::{PartyEvent, PartyInvite, PartyMember, PartyState, Timestamp};
use crate::core::summary;
use anyhow::Result;

/// Core application state (host-agnostic)
///
/// AppCore wires the chat intake to the party tracker. Hosts (the replay and
/// follow commands, or anything embedding the crate) push raw chat lines in
/// and read party state or subscribe to events on the way out.
#[derive(Debug)]
pub struct AppCore {
    /// Application configuration
    pub config: Config,

    /// Dedup + server/player classification
    pub messages: MessageHandler,

    /// Party state machine
    pub party: PartyTracker,

    /// Lines accepted by the message handler
    pub lines_processed: u64,
}

impl AppCore {
    pub fn new(config: Config) -> Result<Self> {
        let party = PartyTracker::new(config.player.name.clone());
        Ok(Self {
            config,
            messages: MessageHandler::new()?,
            party,
            lines_processed: 0,
        })
    }

    /// Override the configured local player name
    pub fn set_local_player(&mut self, name: Option<String>) {
        tracing::info!("Local player set to {:?}", name);
        self.config.player.name = name.clone();
        self.party.set_local_player(name);
    }

    /// Feed one raw chat line. Server and player lines both reach the tracker.
    pub fn process_line(&mut self, raw: &str, now: Timestamp) -> Vec<PartyEvent> {
        let Some(line) = self.messages.handle(raw) else {
            return Vec::new();
        };
        self.lines_processed += 1;
        self.party.handle_message(&line.text, now)
    }

    /// Same as [`process_line`](Self::process_line) but never dropped as a repeat
    pub fn simulate_line(&mut self, raw: &str, now: Timestamp) -> Vec<PartyEvent> {
        let Some(line) = self.messages.simulate(raw) else {
            return Vec::new();
        };
        self.lines_processed += 1;
        self.party.handle_message(&line.text, now)
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PartyEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.party.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.party.remove_listener(id)
    }

    pub fn is_in_party(&self) -> bool {
        self.party.is_in_party()
    }

    pub fn is_leader(&self) -> bool {
        self.party.is_leader()
    }

    pub fn party_state(&self) -> Option<&PartyState> {
        self.party.party_state()
    }

    pub fn leader(&self) -> Option<&PartyMember> {
        self.party.leader()
    }

    pub fn members(&self, include_leader: bool) -> Vec<PartyMember> {
        self.party.members(include_leader)
    }

    pub fn member_names(&self, include_leader: bool) -> Vec<String> {
        self.party.member_names(include_leader)
    }

    pub fn party_size(&self) -> usize {
        self.party.party_size()
    }

    pub fn pending_invites(&mut self, now: Timestamp) -> Vec<PartyInvite> {
        self.party.pending_invites(now)
    }

    /// Summary lines for the current party, using the configured invite limit
    pub fn summary(&mut self, now: Timestamp) -> Vec<String> {
        let invites = self.party.pending_invites(now);
        summary::summary_lines(
            self.party.party_state(),
            &invites,
            now,
            self.config.summary.max_invites,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    fn t0() -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn core_for(player: &str) -> AppCore {
        let mut config = Config::default();
        config.player.name = Some(player.to_string());
        AppCore::new(config).unwrap()
    }

    #[test]
    fn test_process_line_reaches_tracker() {
        let mut core = core_for("SoulReturns");
        let events = core.process_line("§eYou have joined §b[MVP+] Thyla§e's party!", t0());

        assert_eq!(events.len(), 1);
        assert!(core.is_in_party());
        assert_eq!(core.leader().map(|l| l.name.as_str()), Some("Thyla"));
        assert_eq!(core.member_names(false), vec!["SoulReturns"]);
        assert_eq!(core.lines_processed, 1);
    }

    #[test]
    fn test_duplicate_delivery_is_processed_once() {
        let mut core = core_for("SoulReturns");
        core.process_line("[VIP] Bob joined the party.", t0());
        let again = core.process_line("[VIP] Bob joined the party.", t0());

        assert!(again.is_empty());
        assert_eq!(core.lines_processed, 1);
    }

    #[test]
    fn test_simulate_line_is_not_deduplicated() {
        let mut core = core_for("SoulReturns");
        core.process_line("You have joined [MVP+] Thyla's party!", t0());
        core.simulate_line("You have joined [MVP+] Thyla's party!", t0());
        assert_eq!(core.lines_processed, 2);
    }

    #[test]
    fn test_player_lines_feed_tracker() {
        let mut core = core_for("SoulReturns");
        core.process_line("You have joined [MVP++] LateNightLarry's party!", t0());

        // "with:" reads like a name followed by a colon
        let line = "You'll be partying with: [MVP++] LateNightLarry, [MVP+] danielcopter";
        assert!(core.messages.classifier().is_player_message(line));

        core.process_line(line, t0());
        assert_eq!(core.party_size(), 3);

        core.process_line("Party > [MVP+] danielcopter: hello party", t0());
        assert_eq!(core.party_size(), 3);
    }

    #[test]
    fn test_listener_and_summary() {
        let mut core = core_for("SoulReturns");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        core.add_listener(move |event| {
            sink.lock().unwrap().push(event.to_string());
            Ok(())
        });

        core.process_line("[MVP+] Thyla has invited you to join their party!", t0());
        assert_eq!(*seen.lock().unwrap(), vec!["invite from Thyla"]);

        assert_eq!(
            core.summary(t0() + Duration::seconds(20)),
            vec!["Not in a party"]
        );

        core.process_line(
            "[MVP+] SoulReturns invited [VIP] Bob to the party! They have 60 seconds to accept.",
            t0() + Duration::seconds(20),
        );
        assert_eq!(
            core.summary(t0() + Duration::seconds(30)),
            vec![
                "Leader: [MVP+] SoulReturns",
                "Size: 1",
                "Invites:",
                "<- Thyla (30s)",
                "-> Bob (50s)",
            ]
        );
        assert!(core.is_leader());
    }

    #[test]
    fn test_set_local_player() {
        let mut core = AppCore::new(Config::default()).unwrap();
        assert!(core.process_line("You have joined [MVP+] Thyla's party!", t0()).is_empty());

        core.set_local_player(Some("SoulReturns".to_string()));
        core.simulate_line("You have joined [MVP+] Thyla's party!", t0());
        assert_eq!(core.party_size(), 2);
    }
}
