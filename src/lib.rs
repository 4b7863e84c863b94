//! Bounded Multi-Room Chat Venue Library
//!
//! Models a chat server with a fixed set of capacity-limited rooms, driven
//! by an administrator actor and many user actors running concurrently on
//! tokio. Chat is abstracted to membership: the observable output is a
//! stream of structured open/close/admit/reject/leave events.
//!
//! # Features
//! - Capacity-gated server and room membership with duplicate-ID checks
//! - Open/closed lifecycle with cascading server close
//! - Admin actor that toggles side rooms, then shuts everything down
//! - User actors paced by a decaying desire budget
//! - Pluggable event sinks (tracing, JSON lines, in-memory)
//! - Injected randomness and cancellable pauses for deterministic tests
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` and every `ChatRoom` are workers owning their own state
//! - Handles send commands and await `oneshot` replies
//! - The server may wait on rooms, rooms never wait on the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use rand::{rngs::StdRng, SeedableRng};
//! use tokio_util::sync::CancellationToken;
//! use chat_venue::{simulation, Config, TracingSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let mut rng = StdRng::from_entropy();
//!     let report = simulation::run(
//!         &config,
//!         Arc::new(TracingSink),
//!         CancellationToken::new(),
//!         &mut rng,
//!     )
//!     .await
//!     .unwrap();
//!     println!("{} users finished", report.completed_users());
//! }
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod event;
pub mod pacing;
pub mod room;
pub mod server;
pub mod simulation;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use admin::{Admin, AdminPhase};
pub use config::{Config, ConfigError, EventFormat};
pub use error::{ActorExit, ChatError, Interrupted};
pub use event::{
    Entity, Event, EventKind, EventSink, JsonSink, MemorySink, Rejection, SharedSink, TracingSink,
};
pub use pacing::Pacer;
pub use room::{ChatRoom, RoomHandle};
pub use server::{ChatServer, ServerConfig, ServerHandle};
pub use simulation::SimulationReport;
pub use types::{Member, RoomId, SessionId, UserId};
pub use user::{User, UserPhase};
