//! Event streaming over a broadcast channel.
//!
//! Lets observers in other tasks follow an import while it runs.

use tokio::sync::broadcast;
use tracing::trace;

use super::{Event, Notifier, Verdict};

/// Broadcasts events to all subscribers. Never vetoes.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Event>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Get a receiver for the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&mut self, event: &Event) -> Verdict {
        // No receivers is fine
        if self.sender.send(event.clone()).is_err() {
            trace!(event = %event.name, "no event subscribers");
        }
        Verdict::Continue
    }
}
