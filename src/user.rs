//! User actor
//!
//! A user joins the server, then the main room, then keeps trying random
//! side rooms. Every attempt costs desire whether or not it succeeds, and
//! so does time spent in a room; the actor stops once desire runs out.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ActorExit, ChatError};
use crate::pacing::{Pacer, DEFAULT_PACING_SCALE};
use crate::server::ServerHandle;
use crate::types::{Member, UserId};

/// Desire spent on a server join attempt
pub const JOIN_SERVER_COST: f64 = 0.5;
/// Desire spent on a main room attempt
pub const MAIN_ROOM_COST: f64 = 1.0;
/// Desire spent on a random room attempt
pub const RANDOM_ROOM_COST: f64 = 2.0;

/// Where the user currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPhase {
    NotInServer,
    InServerOnly,
    InMainRoom,
    InRandomRoom,
    Done,
}

/// The user actor
pub struct User<R = StdRng> {
    member: Member,
    desire: f64,
    in_server: bool,
    in_main_room: bool,
    in_random_room: bool,
    /// Set once the main room admitted this user; later rounds go to side rooms
    visited_main_room: bool,
    done: bool,
    server: ServerHandle,
    pacer: Pacer,
    rng: R,
}

impl User<StdRng> {
    /// Create a user with an entropy-seeded RNG
    pub fn new(id: UserId, desire: f64, server: ServerHandle, cancel: CancellationToken) -> Self {
        Self::with_rng(id, desire, server, cancel, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> User<R> {
    /// Create a user with an injected RNG
    pub fn with_rng(
        id: UserId,
        desire: f64,
        server: ServerHandle,
        cancel: CancellationToken,
        rng: R,
    ) -> Self {
        Self {
            member: Member::new(id),
            desire,
            in_server: false,
            in_main_room: false,
            in_random_room: false,
            visited_main_room: false,
            done: false,
            server,
            pacer: Pacer::new(DEFAULT_PACING_SCALE, cancel),
            rng,
        }
    }

    /// Set the base pause and stay unit
    pub fn pacing_scale(mut self, scale: Duration) -> Self {
        self.pacer = Pacer::new(scale, self.pacer.cancel_token().clone());
        self
    }

    pub fn id(&self) -> UserId {
        self.member.id
    }

    pub fn member(&self) -> Member {
        self.member
    }

    pub fn desire(&self) -> f64 {
        self.desire
    }

    pub fn phase(&self) -> UserPhase {
        if self.done {
            UserPhase::Done
        } else if self.in_random_room {
            UserPhase::InRandomRoom
        } else if self.in_main_room {
            UserPhase::InMainRoom
        } else if self.in_server {
            UserPhase::InServerOnly
        } else {
            UserPhase::NotInServer
        }
    }

    fn spend(&mut self, cost: f64) {
        self.desire -= cost;
    }

    /// Run until desire is exhausted or a pause is interrupted
    ///
    /// An interrupted user stops immediately and does not leave the server.
    pub async fn run(&mut self) -> Result<ActorExit, ChatError> {
        info!("User {} started ({})", self.member.id, self.desire);

        while self.desire > 0.0 {
            match self.step().await {
                Ok(()) => {}
                Err(ChatError::Interrupted(_)) => {
                    warn!("Interrupted User {} ({})", self.member.id, self.desire);
                    return Ok(ActorExit::Interrupted);
                }
                Err(e) => return Err(e),
            }
        }

        self.server.leave(self.member).await?;
        self.in_server = false;
        self.done = true;
        info!("User {} has ended", self.member.id);

        Ok(ActorExit::Completed)
    }

    /// One iteration of the user loop
    ///
    /// Always lowers desire by at least [`JOIN_SERVER_COST`].
    pub async fn step(&mut self) -> Result<(), ChatError> {
        if !self.in_server {
            self.in_server = self.server.join(self.member).await?;
            self.spend(JOIN_SERVER_COST);
            if !self.in_server {
                self.pacer.between_actions(&mut self.rng).await?;
            }
        } else if !self.visited_main_room {
            self.in_main_room = self.server.join_main_room(self.member).await?;
            self.spend(MAIN_ROOM_COST);
            if self.in_main_room {
                self.visited_main_room = true;
            } else {
                self.pacer.between_actions(&mut self.rng).await?;
            }
        } else {
            self.in_random_room = self.server.join_random_room(self.member).await?;
            self.spend(RANDOM_ROOM_COST);
            if !self.in_random_room {
                self.pacer.between_actions(&mut self.rng).await?;
            }
        }

        if self.in_main_room || self.in_random_room {
            let units = self.pacer.stay_units(&mut self.rng);
            debug!("User {} staying for {} units", self.member.id, units);
            self.pacer.stay(units).await?;
            self.spend(f64::from(units));

            self.server.leave_rooms(self.member).await?;
            self.in_main_room = false;
            self.in_random_room = false;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::{Entity, EventKind, MemorySink};
    use crate::server::{ChatServer, ServerConfig};
    use crate::types::RoomId;

    fn spawn_server(capacity: usize, room_count: usize) -> (ServerHandle, Arc<MemorySink>) {
        let sink = MemorySink::new();
        let server = ChatServer::spawn(
            ServerConfig {
                capacity,
                room_count,
            },
            sink.clone(),
            StdRng::seed_from_u64(13),
        )
        .unwrap();
        (server, sink)
    }

    fn user(id: u32, desire: f64, server: &ServerHandle) -> User {
        User::with_rng(
            UserId(id),
            desire,
            server.clone(),
            CancellationToken::new(),
            StdRng::seed_from_u64(u64::from(id)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_progresses_server_main_then_side_room() {
        let (server, sink) = spawn_server(10, 2);
        let mut alice = user(1, 100.0, &server);
        assert_eq!(alice.phase(), UserPhase::NotInServer);

        alice.step().await.unwrap();
        assert_eq!(alice.phase(), UserPhase::InServerOnly);
        assert_eq!(alice.desire(), 99.5);

        alice.step().await.unwrap();
        // stayed in the main room, then left it
        assert_eq!(alice.phase(), UserPhase::InServerOnly);
        assert!(alice.desire() <= 99.5 - 1.0 - 2.0);
        assert!(alice.desire() >= 99.5 - 1.0 - 5.0);
        assert_eq!(server.main_room().occupancy().await.unwrap(), 0);
        assert_eq!(server.members().await.unwrap(), vec![alice.member()]);

        alice.step().await.unwrap();
        let side = sink.events_for(Entity::Room(RoomId(1)));
        assert_eq!(side[0].kind, EventKind::Admitted { user: UserId(1) });
        assert_eq!(side[1].kind, EventKind::Left { user: UserId(1) });

        // main room is not revisited
        let before = sink.events_for(Entity::Room(RoomId::MAIN)).len();
        alice.step().await.unwrap();
        assert_eq!(sink.events_for(Entity::Room(RoomId::MAIN)).len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_desire_strictly_decreases_when_server_full() {
        let (server, _sink) = spawn_server(1, 2);
        server.join(Member::new(UserId(99))).await.unwrap();

        let mut bob = user(2, 10.0, &server);
        let mut previous = bob.desire();
        let mut steps = 0;
        while bob.desire() > 0.0 {
            bob.step().await.unwrap();
            assert!(bob.desire() < previous);
            previous = bob.desire();
            steps += 1;
        }

        assert_eq!(steps, 20);
        assert_eq!(bob.phase(), UserPhase::NotInServer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_room_attempts_cost_desire() {
        // capacity 1 rooms admit nobody
        let (server, _sink) = spawn_server(1, 2);
        let mut carol = user(3, 5.0, &server);

        carol.step().await.unwrap();
        assert_eq!(carol.desire(), 4.5);
        carol.step().await.unwrap();
        assert_eq!(carol.desire(), 3.5);
        assert_eq!(carol.phase(), UserPhase::InServerOnly);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_run_terminates_and_leaves_server() {
        let (server, sink) = spawn_server(10, 3);
        let mut dave = user(4, 12.0, &server);

        let exit = dave.run().await.unwrap();

        assert_eq!(exit, ActorExit::Completed);
        assert_eq!(dave.phase(), UserPhase::Done);
        assert!(dave.desire() <= 0.0);
        assert_eq!(server.member_count().await.unwrap(), 0);
        for room in server.rooms() {
            assert_eq!(room.occupancy().await.unwrap(), 0);
        }

        let last_server_event = sink.events_for(Entity::Server).pop().unwrap();
        assert_eq!(last_server_event.kind, EventKind::Left { user: UserId(4) });
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_with_no_desire_only_leaves() {
        let (server, sink) = spawn_server(10, 2);
        let mut erin = user(5, 0.0, &server);

        assert_eq!(erin.run().await.unwrap(), ActorExit::Completed);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_user_stays_registered() {
        let (server, _sink) = spawn_server(10, 2);
        let cancel = CancellationToken::new();
        let mut frank = User::with_rng(
            UserId(6),
            50.0,
            server.clone(),
            cancel.clone(),
            StdRng::seed_from_u64(6),
        );

        frank.step().await.unwrap();
        cancel.cancel();

        // next step enters the main room, then the stay is interrupted
        assert_eq!(frank.run().await.unwrap(), ActorExit::Interrupted);
        assert_eq!(frank.phase(), UserPhase::InMainRoom);
        assert_eq!(server.members().await.unwrap(), vec![frank.member()]);
        assert_eq!(server.main_room().occupancy().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_users_fit_capacity_two_third_fails() {
        let (server, _sink) = spawn_server(2, 2);

        let mut tasks = tokio::task::JoinSet::new();
        for id in 1..=3 {
            let mut u = user(id, 20.0, &server).pacing_scale(Duration::from_millis(1));
            tasks.spawn(async move {
                u.step().await.unwrap();
                u
            });
        }

        let mut users = Vec::new();
        while let Some(result) = tasks.join_next().await {
            users.push(result.unwrap());
        }

        let admitted = users
            .iter()
            .filter(|u| u.phase() == UserPhase::InServerOnly)
            .count();
        let rejected = users
            .iter()
            .filter(|u| u.phase() == UserPhase::NotInServer)
            .count();
        assert_eq!(admitted, 2);
        assert_eq!(rejected, 1);
        assert_eq!(server.member_count().await.unwrap(), 2);
    }
}
