//! Lifecycle notifications.
//!
//! The importer emits an [`Event`] at each stage. Events at `starting`,
//! `prepared-reader` and `table-exists` may be vetoed, which stops the run
//! after a single `exiting` event.

pub mod broadcast;

pub use broadcast::BroadcastNotifier;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

/// Default event name prefix.
pub const DEFAULT_PREFIX: &str = "dataset::";

/// Lifecycle point of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Starting,
    PreparedReader,
    TableExists,
    /// A row was rejected or failed to insert.
    Error,
    /// A stage was vetoed; payload names it.
    Exiting,
    Finished,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::PreparedReader => "prepared-reader",
            Stage::TableExists => "table-exists",
            Stage::Error => "error",
            Stage::Exiting => "exiting",
            Stage::Finished => "finished",
        }
    }

    /// Whether a veto at this stage stops the run.
    pub fn is_boundary(&self) -> bool {
        matches!(self, Stage::Starting | Stage::PreparedReader | Stage::TableExists)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named notification with its payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Prefix followed by the stage name, e.g. `dataset::starting`.
    pub name: String,
    pub stage: Stage,
    pub payload: Value,
}

impl Event {
    pub fn new(prefix: &str, stage: Stage, payload: Value) -> Self {
        Self {
            name: format!("{}{}", prefix, stage),
            stage,
            payload,
        }
    }
}

/// A handler's answer to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Veto,
}

impl Verdict {
    pub fn is_veto(&self) -> bool {
        matches!(self, Verdict::Veto)
    }
}

impl From<bool> for Verdict {
    /// `false` vetoes.
    fn from(proceed: bool) -> Self {
        if proceed {
            Verdict::Continue
        } else {
            Verdict::Veto
        }
    }
}

/// Receives every event of a run.
pub trait Notifier {
    fn notify(&mut self, event: &Event) -> Verdict;
}

type Listener = Box<dyn FnMut(&Event) -> Verdict + Send>;

/// Listeners registered by event name, or for every event.
///
/// Every matching listener is called; the dispatch vetoes when any of them
/// does.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(Option<String>, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to one event by full name, e.g. `dataset::starting`.
    pub fn listen<F>(&mut self, name: impl Into<String>, listener: F) -> &mut Self
    where
        F: FnMut(&Event) -> Verdict + Send + 'static,
    {
        self.listeners.push((Some(name.into()), Box::new(listener)));
        self
    }

    /// Listen to every event.
    pub fn listen_all<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&Event) -> Verdict + Send + 'static,
    {
        self.listeners.push((None, Box::new(listener)));
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .listeners
            .iter()
            .map(|(name, _)| name.as_deref().unwrap_or("*"))
            .collect();
        f.debug_struct("EventBus").field("listeners", &names).finish()
    }
}

impl Notifier for EventBus {
    fn notify(&mut self, event: &Event) -> Verdict {
        let mut verdict = Verdict::Continue;
        for (name, listener) in &mut self.listeners {
            if name.as_deref().map_or(true, |n| n == event.name) && listener(event).is_veto() {
                verdict = Verdict::Veto;
            }
        }
        verdict
    }
}

/// Logs every event through tracing. Never vetoes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, event: &Event) -> Verdict {
        match event.stage {
            Stage::Error | Stage::Exiting => warn!(event = %event.name, payload = %event.payload, "import event"),
            _ => info!(event = %event.name, payload = %event.payload, "import event"),
        }
        Verdict::Continue
    }
}
