//! Party event fan-out
//!
//! Listeners are called synchronously in registration order. Publishing walks a
//! snapshot of the subscriber list, so a listener may subscribe or unsubscribe
//! (itself included) while an event is being delivered; the change applies from
//! the next publish.

use crate::core::state::PartyEvent;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`EventSink::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&PartyEvent) -> anyhow::Result<()> + Send + Sync>;

type Subscribers = Arc<Vec<(ListenerId, Listener)>>;

#[derive(Clone, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PartyEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = (**guard).clone();
        next.push((id, Arc::new(listener)));
        *guard = Arc::new(next);
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next = guard
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Deliver to every current listener. Failures are logged, never returned.
    pub fn publish(&self, event: &PartyEvent) {
        let subscribers = self.snapshot();
        for (id, listener) in subscribers.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(listener = ?id, event = event.name(), "Party listener failed: {:#}", e);
                }
                Err(_) => {
                    tracing::error!(listener = ?id, event = event.name(), "Party listener panicked");
                }
            }
        }
    }

    fn snapshot(&self) -> Subscribers {
        Arc::clone(&self.subscribers.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("listeners", &self.len())
            .finish()
    }
}
