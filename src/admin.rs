//! Admin actor
//!
//! Opens the server and main room, randomly toggles side rooms for a fixed
//! number of actions, then closes every room and the server.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ActorExit, ChatError};
use crate::pacing::{Pacer, DEFAULT_PACING_SCALE};
use crate::server::{random_side_room, ServerHandle};
use crate::types::RoomId;

/// Default number of toggle actions
pub const DEFAULT_ACTION_COUNT: usize = 15;

/// Where the admin is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminPhase {
    /// Not started
    Idle,
    /// Server and main room opened
    Opened,
    /// Performing action `k` (zero-based)
    Iterating(usize),
    /// Shutting rooms and server down
    ClosingAll,
    /// Everything closed
    Terminated,
}

/// The administrator actor
pub struct Admin<R = StdRng> {
    name: String,
    action_count: usize,
    server: ServerHandle,
    pacer: Pacer,
    rng: R,
    phase: AdminPhase,
}

impl Admin<StdRng> {
    /// Create an admin bound to `server` with an entropy-seeded RNG
    pub fn new(name: impl Into<String>, server: ServerHandle, cancel: CancellationToken) -> Self {
        Self::with_rng(name, server, cancel, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> Admin<R> {
    /// Create an admin with an injected RNG
    pub fn with_rng(
        name: impl Into<String>,
        server: ServerHandle,
        cancel: CancellationToken,
        rng: R,
    ) -> Self {
        Self {
            name: name.into(),
            action_count: DEFAULT_ACTION_COUNT,
            server,
            pacer: Pacer::new(DEFAULT_PACING_SCALE, cancel),
            rng,
            phase: AdminPhase::Idle,
        }
    }

    /// Set how many toggle actions to perform
    pub fn action_count(mut self, action_count: usize) -> Self {
        self.action_count = action_count;
        self
    }

    /// Set the base pause between actions
    pub fn pacing_scale(mut self, scale: Duration) -> Self {
        self.pacer = Pacer::new(scale, self.pacer.cancel_token().clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> AdminPhase {
        self.phase
    }

    /// Run the admin protocol to completion or interruption
    ///
    /// An interrupted admin stops where it is: rooms it opened stay open.
    pub async fn run(&mut self) -> Result<ActorExit, ChatError> {
        info!("Admin {} started", self.name);

        match self.drive().await {
            Ok(()) => {
                info!("Admin {} finished", self.name);
                Ok(ActorExit::Completed)
            }
            Err(ChatError::Interrupted(_)) => {
                warn!("Admin {} interrupted during {:?}", self.name, self.phase);
                Ok(ActorExit::Interrupted)
            }
            Err(e) => Err(e),
        }
    }

    async fn drive(&mut self) -> Result<(), ChatError> {
        self.server.open().await?;
        self.server.main_room().open().await?;
        self.phase = AdminPhase::Opened;

        for k in 0..self.action_count {
            self.phase = AdminPhase::Iterating(k);
            let id = random_side_room(&mut self.rng, self.server.room_count());
            toggle(&self.server, id).await?;
            self.pacer.between_actions(&mut self.rng).await?;
        }

        self.phase = AdminPhase::ClosingAll;
        for room in self.server.rooms() {
            if room.is_open().await? {
                room.close().await?;
            }
        }
        self.server.main_room().close().await?;
        self.server.close().await?;

        self.phase = AdminPhase::Terminated;
        Ok(())
    }
}

/// Close the room if open, open it otherwise
async fn toggle(server: &ServerHandle, id: RoomId) -> Result<(), ChatError> {
    let Some(room) = server.room(id) else {
        return Ok(());
    };

    if room.is_open().await? {
        debug!("Toggling Chat Room {} closed", id);
        room.close().await
    } else {
        debug!("Toggling Chat Room {} open", id);
        room.open().await
    }
}
