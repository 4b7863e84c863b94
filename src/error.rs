//! Error types for the chat venue
//!
//! Defines construction and infrastructure errors.
//! Expected outcomes (full, duplicate ID, unknown room) are plain `bool`
//! returns and never appear here.

use thiserror::Error;

use crate::types::RoomId;

/// Chat venue errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Server or room capacity was zero
    #[error("Capacity must be positive")]
    InvalidCapacity,

    /// Random room selection needs at least one room besides the main room
    #[error("At least 2 rooms are required, got {0}")]
    TooFewRooms(usize),

    /// Driver settings outside their valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The server worker has stopped (internal channel broken)
    #[error("Chat server is no longer running")]
    ServerUnavailable,

    /// A room worker has stopped (internal channel broken)
    #[error("Chat room {0} is no longer running")]
    RoomUnavailable(RoomId),

    /// An actor's pause was cancelled
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// An actor task panicked or was aborted
    #[error("Actor task failed: {0}")]
    TaskFailed(String),
}

/// How an actor's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorExit {
    /// The actor ran its protocol to the end
    Completed,
    /// A pause was cancelled; the actor stopped where it was
    Interrupted,
}

/// Marker returned by a cancelled pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Interrupted during pause")]
pub struct Interrupted;
