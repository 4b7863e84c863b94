//! Membership and lifecycle event records
//!
//! Every state transition of the server or a room is reported as an
//! [`Event`] through an [`EventSink`]. Events use Serde's tagged enum so a
//! sink can write them out as JSON without further mapping.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info};

use crate::types::{RoomId, UserId};

/// Which entity an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// The chat server itself
    Server,
    /// One of the server's rooms
    Room(RoomId),
}

/// Why an admission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The same session is already registered
    AlreadyPresent,
    /// Another member holds the same user ID
    DuplicateId,
    /// Capacity check failed
    Full,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Entity switched from closed to open
    Opened,
    /// Entity switched from open to closed
    Closed,
    /// A user was admitted
    Admitted { user: UserId },
    /// A user was refused
    Rejected { user: UserId, reason: Rejection },
    /// A user was removed
    Left { user: UserId },
}

/// A single structured event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    pub entity: Entity,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(entity: Entity, kind: EventKind) -> Self {
        Self { entity, kind }
    }

    /// User ID carried by membership events
    pub fn user(&self) -> Option<UserId> {
        match self.kind {
            EventKind::Admitted { user }
            | EventKind::Rejected { user, .. }
            | EventKind::Left { user } => Some(user),
            EventKind::Opened | EventKind::Closed => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Server => write!(f, "Chat Server"),
            Entity::Room(id) => write!(f, "Chat Room {}", id),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Rejection::AlreadyPresent => "already present",
            Rejection::DuplicateId => "duplicate id",
            Rejection::Full => "full",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Opened => write!(f, "{} opened", self.entity),
            EventKind::Closed => write!(f, "{} closed", self.entity),
            EventKind::Admitted { user } => write!(f, "User {} admitted to {}", user, self.entity),
            EventKind::Rejected { user, reason } => {
                write!(f, "User {} not admitted to {} ({})", user, self.entity, reason)
            }
            EventKind::Left { user } => write!(f, "User {} left {}", user, self.entity),
        }
    }
}

/// Destination for emitted events
///
/// Called from inside the server and room workers, so implementations must
/// not block for long.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Shared sink handle used by the workers
pub type SharedSink = Arc<dyn EventSink>;

impl<F> EventSink for F
where
    F: Fn(Event) + Send + Sync,
{
    fn emit(&self, event: Event) {
        self(event)
    }
}

/// Logs each event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match event.user() {
            Some(user) => info!(user = user.0, "{}", event),
            None => info!("{}", event),
        }
    }
}

/// Writes each event as one JSON line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize event: {}", e),
        }
    }
}

/// Keeps every event in emission order
///
/// Mostly useful in tests, where the captured log is asserted on.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events belonging to one entity
    pub fn events_for(&self, entity: Entity) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.entity == entity)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialize() {
        let event = Event::new(
            Entity::Room(RoomId(1)),
            EventKind::Rejected {
                user: UserId(42),
                reason: Rejection::DuplicateId,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"entity\":{\"room\":1}"));
        assert!(json.contains("\"type\":\"rejected\""));
        assert!(json.contains("\"user\":42"));
        assert!(json.contains("\"reason\":\"duplicate_id\""));
    }

    #[test]
    fn test_server_event_serialize() {
        let event = Event::new(Entity::Server, EventKind::Opened);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"entity\":\"server\""));
        assert!(json.contains("\"type\":\"opened\""));
    }

    #[test]
    fn test_event_display() {
        let event = Event::new(Entity::Server, EventKind::Admitted { user: UserId(3) });
        assert_eq!(event.to_string(), "User 3 admitted to Chat Server");
        assert_eq!(event.user(), Some(UserId(3)));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(Event::new(Entity::Server, EventKind::Opened));
        sink.emit(Event::new(Entity::Room(RoomId(0)), EventKind::Opened));
        sink.emit(Event::new(Entity::Server, EventKind::Closed));

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].kind, EventKind::Closed);
        assert_eq!(sink.events_for(Entity::Server).len(), 2);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let sink = move |_event: Event| {
            *counter.lock().unwrap() += 1;
        };
        sink.emit(Event::new(Entity::Server, EventKind::Opened));
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
