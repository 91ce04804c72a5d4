//! Chat message intake
//!
//! Trims incoming lines, drops an immediate repeat (the same content can arrive
//! through both the chat and the game channel), classifies each line as server
//! or player, and hands it to the handlers registered for that kind.

use crate::parser::{ChatClassifier, MessageKind};
use anyhow::Result;

pub type MessageCallback = Box<dyn FnMut(&str) -> Result<()> + Send>;

/// A line that made it past deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub kind: MessageKind,
    pub text: String, // Trimmed, color codes intact
}

pub struct MessageHandler {
    classifier: ChatClassifier,

    /// Last line handed to handlers (for dedup)
    last_processed: Option<String>,

    server_handlers: Vec<MessageCallback>,
    player_handlers: Vec<MessageCallback>,
}

impl MessageHandler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: ChatClassifier::new()?,
            last_processed: None,
            server_handlers: Vec::new(),
            player_handlers: Vec::new(),
        })
    }

    pub fn classifier(&self) -> &ChatClassifier {
        &self.classifier
    }

    /// Register a callback for lines that don't look like player chat
    pub fn on_server_message<F>(&mut self, handler: F)
    where
        F: FnMut(&str) -> Result<()> + Send + 'static,
    {
        self.server_handlers.push(Box::new(handler));
    }

    /// Register a callback for party, guild, officer and public chat
    pub fn on_player_message<F>(&mut self, handler: F)
    where
        F: FnMut(&str) -> Result<()> + Send + 'static,
    {
        self.player_handlers.push(Box::new(handler));
    }

    pub fn clear_handlers(&mut self) {
        self.server_handlers.clear();
        self.player_handlers.clear();
        tracing::debug!("Cleared all message handlers");
    }

    /// Process one raw line. Returns None for blank lines and duplicates.
    pub fn handle(&mut self, raw: &str) -> Option<ClassifiedLine> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if self.last_processed.as_deref() == Some(trimmed) {
            tracing::trace!("Dropping repeated line: {}", trimmed);
            return None;
        }
        self.last_processed = Some(trimmed.to_string());

        let kind = self.classifier.classify(trimmed);
        tracing::debug!("[{}] {}", kind.as_str(), trimmed);

        let handlers = match kind {
            MessageKind::Player => &mut self.player_handlers,
            MessageKind::Server => &mut self.server_handlers,
        };
        for (index, handler) in handlers.iter_mut().enumerate() {
            if let Err(e) = handler(trimmed) {
                tracing::error!("Error in {} message handler #{}: {:#}", kind.as_str(), index, e);
            }
        }

        Some(ClassifiedLine {
            kind,
            text: trimmed.to_string(),
        })
    }

    /// Inject a line as if it had arrived from the game, bypassing dedup
    pub fn simulate(&mut self, raw: &str) -> Option<ClassifiedLine> {
        self.last_processed = None;
        self.handle(raw)
    }
}

impl std::fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler")
            .field("last_processed", &self.last_processed)
            .field("server_handlers", &self.server_handlers.len())
            .field("player_handlers", &self.player_handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_handler() -> (MessageHandler, Arc<Mutex<Vec<String>>>) {
        let mut handler = MessageHandler::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let server = Arc::clone(&seen);
        handler.on_server_message(move |line| {
            server.lock().unwrap().push(format!("server:{}", line));
            Ok(())
        });
        let player = Arc::clone(&seen);
        handler.on_player_message(move |line| {
            player.lock().unwrap().push(format!("player:{}", line));
            Ok(())
        });

        (handler, seen)
    }

    #[test]
    fn test_routes_by_kind() {
        let (mut handler, seen) = recording_handler();

        let line = handler.handle("  [VIP] Bob joined the party.  ").unwrap();
        assert_eq!(line.kind, MessageKind::Server);
        assert_eq!(line.text, "[VIP] Bob joined the party.");

        handler.handle("Party > [MVP+] Thyla: hi");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "server:[VIP] Bob joined the party.".to_string(),
                "player:Party > [MVP+] Thyla: hi".to_string(),
            ]
        );
    }

    #[test]
    fn test_drops_immediate_duplicate() {
        let (mut handler, seen) = recording_handler();

        assert!(handler.handle("You left the party.").is_some());
        assert!(handler.handle("You left the party.  ").is_none());
        assert!(handler.handle("Double Hook!").is_some());
        assert!(handler.handle("You left the party.").is_some());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let (mut handler, seen) = recording_handler();
        assert!(handler.handle("   ").is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_simulate_bypasses_dedup() {
        let (mut handler, seen) = recording_handler();
        handler.handle("You left the party.");
        assert!(handler.simulate("You left the party.").is_some());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let mut handler = MessageHandler::new().unwrap();
        let count = Arc::new(Mutex::new(0));

        handler.on_server_message(|_| Err(anyhow::anyhow!("broken")));
        let counter = Arc::clone(&count);
        handler.on_server_message(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        handler.handle("You left the party.");
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_clear_handlers() {
        let (mut handler, seen) = recording_handler();
        handler.clear_handlers();
        assert!(handler.handle("You left the party.").is_some());
        assert!(seen.lock().unwrap().is_empty());
    }
}
