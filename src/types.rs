//! Basic type definitions for the chat venue
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: externally supplied numeric user identifier (may collide)
//! - `SessionId`: UUID-based identity of one user actor
//! - `RoomId`: index-like identifier of a room within its server
//! - `Member`: the pair passed into every membership operation

use serde::Serialize;
use uuid::Uuid;

/// Numeric user identifier (newtype pattern)
///
/// Supplied from outside, so two actors can carry the same value.
/// Uniqueness is enforced per registry, not globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. Two members are the same participant iff their
/// sessions are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier, assigned in construction order (0 is the main room)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(pub usize);

impl RoomId {
    /// The main room's ID
    pub const MAIN: RoomId = RoomId(0);

    /// Whether this is the main room
    pub fn is_main(self) -> bool {
        self == Self::MAIN
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant as seen by the server and rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Member {
    /// Identity of the actor behind this member
    pub session: SessionId,
    /// Externally supplied user ID
    pub id: UserId,
}

impl Member {
    /// Create a member with a fresh session for the given user ID
    pub fn new(id: UserId) -> Self {
        Self {
            session: SessionId::new(),
            id,
        }
    }

    /// Whether another member shares this member's user ID
    pub fn same_id(&self, other: &Member) -> bool {
        self.id == other.id
    }
}
