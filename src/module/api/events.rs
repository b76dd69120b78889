//! Diagnostic event delivery
//!
//! The scanner, catalog and engine publish non-fatal diagnostics through an
//! `EventManager` handed to them explicitly. Collaborators subscribe and get
//! an unbounded channel receiver; nothing is registered globally.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Receiving end handed to subscribers
pub type DiagnosticReceiver = mpsc::UnboundedReceiver<DiagnosticEvent>;

/// Event categories subscribers can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// Scanner progress and per-artifact failures
    Scan,
    /// Catalog writes
    Catalog,
    /// Handle resolution and invocation failures
    Invocation,
}

/// Non-fatal diagnostic emitted by the module system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticEvent {
    ScanStarted {
        module_id: String,
        path: PathBuf,
    },
    TargetSelected {
        package: PathBuf,
        target: String,
    },
    TargetSkipped {
        package: PathBuf,
        reason: String,
    },
    ArtifactFailed {
        module_id: String,
        artifact: PathBuf,
        error: String,
    },
    ScanCompleted {
        module_id: String,
        types: usize,
        members: usize,
    },
    RecordAdded {
        module_id: String,
        version: String,
    },
    RecordReplaced {
        module_id: String,
        previous_version: String,
        version: String,
    },
    RecordRemoved {
        module_id: String,
    },
    CatalogCleared {
        removed: usize,
    },
    HandleResolved {
        module_id: String,
        handle: String,
    },
    InvocationFailed {
        member: String,
        error: String,
    },
}

impl DiagnosticEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DiagnosticEvent::ScanStarted { .. }
            | DiagnosticEvent::TargetSelected { .. }
            | DiagnosticEvent::TargetSkipped { .. }
            | DiagnosticEvent::ArtifactFailed { .. }
            | DiagnosticEvent::ScanCompleted { .. } => EventKind::Scan,
            DiagnosticEvent::RecordAdded { .. }
            | DiagnosticEvent::RecordReplaced { .. }
            | DiagnosticEvent::RecordRemoved { .. }
            | DiagnosticEvent::CatalogCleared { .. } => EventKind::Catalog,
            DiagnosticEvent::HandleResolved { .. } | DiagnosticEvent::InvocationFailed { .. } => {
                EventKind::Invocation
            }
        }
    }
}

struct Subscriber {
    kinds: Option<Vec<EventKind>>,
    sender: mpsc::UnboundedSender<DiagnosticEvent>,
}

impl Subscriber {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }
}

/// Event subscription manager
///
/// Cloning shares the subscriber list, so one manager can be threaded into
/// the scanner, the catalog and the engine at once.
#[derive(Clone, Default)]
pub struct EventManager {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> DiagnosticReceiver {
        self.register(None)
    }

    /// Subscribe to selected event kinds
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> DiagnosticReceiver {
        self.register(Some(kinds.to_vec()))
    }

    fn register(&self, kinds: Option<Vec<EventKind>>) -> DiagnosticReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(Subscriber { kinds, sender });
        receiver
    }

    /// Publish an event to all interested subscribers
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, event: DiagnosticEvent) {
        let kind = event.kind();
        let mut subscribers = self.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|subscriber| {
            if !subscriber.wants(kind) {
                return !subscriber.sender.is_closed();
            }
            match subscriber.sender.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!("Dropping diagnostic subscriber with closed receiver");
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Drain every event currently buffered in `receiver` without waiting
pub fn drain(receiver: &mut DiagnosticReceiver) -> Vec<DiagnosticEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let events = EventManager::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        events.publish(DiagnosticEvent::RecordRemoved {
            module_id: "Sample".to_string(),
        });

        assert_eq!(drain(&mut first).len(), 1);
        assert_eq!(drain(&mut second).len(), 1);
    }

    #[test]
    fn test_kind_filter() {
        let events = EventManager::new();
        let mut scans = events.subscribe_to(&[EventKind::Scan]);

        events.publish(DiagnosticEvent::CatalogCleared { removed: 2 });
        events.publish(DiagnosticEvent::ScanCompleted {
            module_id: "Sample".to_string(),
            types: 1,
            members: 3,
        });

        let received = drain(&mut scans);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), EventKind::Scan);
    }

    #[test]
    fn test_closed_subscribers_are_removed() {
        let events = EventManager::new();
        let receiver = events.subscribe();
        let _kept = events.subscribe();
        drop(receiver);

        events.publish(DiagnosticEvent::CatalogCleared { removed: 0 });
        assert_eq!(events.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let events = EventManager::new();
        events.publish(DiagnosticEvent::CatalogCleared { removed: 0 });
        assert_eq!(events.subscriber_count(), 0);
    }
}
