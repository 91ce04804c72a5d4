//! Core party tracking layer
//!
//! Everything that turns chat lines into party state lives here. No IO and no
//! clock: hosts feed lines and timestamps in and read state or events out.

pub mod app_core;
pub mod events;
pub mod invites;
pub mod list_block;
pub mod messages;
pub mod party;
pub mod rules;
pub mod state;
pub mod summary;

pub use app_core::AppCore;
pub use state::PartyEvent;

#[cfg(test)]
mod tests {
    use super::{AppCore, PartyEvent};
    use crate::config::Config;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_host_facing_exports() {
        let mut config = Config::default();
        config.player.name = Some("SoulReturns".to_string());
        let mut core = AppCore::new(config).unwrap();

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let events = core.process_line("You have joined [MVP+] Thyla's party!", now);
        assert!(matches!(events.as_slice(), [PartyEvent::PartyJoined { .. }]));
    }
}
