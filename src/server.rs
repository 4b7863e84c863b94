//! ChatServer worker implementation
//!
//! The server worker owns the server-level registry and open flag. Its
//! handle also carries the room handles, so room-targeted operations go
//! straight to the room's own worker and never queue behind the server.
//!
//! The server worker may wait on room workers (close sweep, random entry,
//! leave-all), but rooms never talk back to the server, so no wait cycle
//! can form between the two.

use std::sync::Arc;

use rand::{Rng, RngCore};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::event::{Entity, Event, EventKind, Rejection, SharedSink};
use crate::room::{ChatRoom, RoomHandle};
use crate::types::{Member, RoomId};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Minimum rooms: the main room plus one to pick at random
pub const MIN_ROOMS: usize = 2;

/// Construction parameters for a ChatServer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Maximum registered members; also each room's capacity
    pub capacity: usize,
    /// Number of rooms, including the main room
    pub room_count: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.capacity == 0 {
            return Err(ChatError::InvalidCapacity);
        }
        if self.room_count < MIN_ROOMS {
            return Err(ChatError::TooFewRooms(self.room_count));
        }
        Ok(())
    }
}

/// Pick a room uniformly among every room except the main one
///
/// `room_count` must be at least [`MIN_ROOMS`].
pub fn random_side_room<R: Rng + ?Sized>(rng: &mut R, room_count: usize) -> RoomId {
    let id = RoomId(rng.gen_range(1..room_count));
    debug_assert!(!id.is_main());
    id
}

/// Whether every room reports closed; an unreachable room counts as open
async fn all_rooms_closed(rooms: &[RoomHandle]) -> bool {
    for room in rooms {
        match room.is_open().await {
            Ok(false) => {}
            Ok(true) => return false,
            Err(e) => {
                warn!("Cannot confirm room state: {}", e);
                return false;
            }
        }
    }
    true
}

/// Commands sent from handles to the ChatServer worker
#[derive(Debug)]
pub enum ServerCommand {
    /// Mark the server open
    Open { reply: oneshot::Sender<()> },
    /// Close all rooms, clear the registry, then mark closed
    Close { reply: oneshot::Sender<()> },
    /// Register a member
    Join {
        member: Member,
        reply: oneshot::Sender<bool>,
    },
    /// Unregister a member
    Leave {
        member: Member,
        reply: oneshot::Sender<bool>,
    },
    /// Leave every room and unregister, if registered
    LeaveAllRooms {
        member: Member,
        reply: oneshot::Sender<bool>,
    },
    /// Enter a random non-main room
    JoinRandomRoom {
        member: Member,
        reply: oneshot::Sender<Result<bool, ChatError>>,
    },
    /// Query the open flag
    IsOpen { reply: oneshot::Sender<bool> },
    /// Snapshot of registered members
    Members { reply: oneshot::Sender<Vec<Member>> },
}

/// The ChatServer worker
///
/// Processes commands from handles one at a time.
pub struct ChatServer {
    capacity: usize,
    is_open: bool,
    rooms: Arc<[RoomHandle]>,
    /// Registered members, in admission order
    members: Vec<Member>,
    rng: Box<dyn RngCore + Send>,
    sink: SharedSink,
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Build the rooms, open the server and start its worker
    ///
    /// The server is already open (and `Opened` emitted) when this returns.
    /// `rng` drives random room selection.
    pub fn spawn(
        config: ServerConfig,
        sink: SharedSink,
        rng: impl RngCore + Send + 'static,
    ) -> Result<ServerHandle, ChatError> {
        config.validate()?;

        let rooms = (0..config.room_count)
            .map(|i| ChatRoom::spawn(RoomId(i), config.capacity, sink.clone()))
            .collect::<Result<Arc<[RoomHandle]>, ChatError>>()?;

        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut server = Self {
            capacity: config.capacity,
            is_open: false,
            rooms: rooms.clone(),
            members: Vec::new(),
            rng: Box::new(rng),
            sink,
            receiver,
        };
        server.open();
        tokio::spawn(server.run());

        info!(
            "Chat Server started (capacity {}, {} rooms)",
            config.capacity, config.room_count
        );

        Ok(ServerHandle {
            capacity: config.capacity,
            rooms,
            sender,
        })
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    async fn run(mut self) {
        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        debug!("Chat Server worker shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Open { reply } => {
                self.open();
                let _ = reply.send(());
            }
            ServerCommand::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            ServerCommand::Join { member, reply } => {
                let _ = reply.send(self.join(member));
            }
            ServerCommand::Leave { member, reply } => {
                let _ = reply.send(self.leave(member));
            }
            ServerCommand::LeaveAllRooms { member, reply } => {
                let left = self.leave_all_rooms(member).await;
                let _ = reply.send(left);
            }
            ServerCommand::JoinRandomRoom { member, reply } => {
                let joined = self.join_random_room(member).await;
                let _ = reply.send(joined);
            }
            ServerCommand::IsOpen { reply } => {
                let _ = reply.send(self.is_open);
            }
            ServerCommand::Members { reply } => {
                let _ = reply.send(self.members.clone());
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        self.sink.emit(Event::new(Entity::Server, kind));
    }

    fn open(&mut self) {
        if !self.is_open {
            self.is_open = true;
            self.emit(EventKind::Opened);
        }
    }

    /// Close every room, clear the registry, then flip the flag
    ///
    /// The flag only flips if every room confirms it is closed.
    async fn close(&mut self) {
        info!("Chat Server is being closed");

        for room in self.rooms.iter() {
            if let Err(e) = room.close().await {
                warn!("Failed to close room during server close: {}", e);
            }
        }

        for member in std::mem::take(&mut self.members) {
            self.emit(EventKind::Left { user: member.id });
        }

        if self.is_open && all_rooms_closed(&self.rooms).await {
            self.is_open = false;
            self.emit(EventKind::Closed);
        }
    }

    fn is_registered(&self, member: &Member) -> bool {
        self.members.iter().any(|m| m.session == member.session)
    }

    /// Admission check: strict `size < capacity`, open flag not consulted
    fn admission(&self, member: &Member) -> Result<(), Rejection> {
        if self.is_registered(member) {
            return Err(Rejection::AlreadyPresent);
        }
        if self.members.len() >= self.capacity {
            return Err(Rejection::Full);
        }
        if self.members.iter().any(|m| m.same_id(member)) {
            return Err(Rejection::DuplicateId);
        }
        Ok(())
    }

    fn join(&mut self, member: Member) -> bool {
        match self.admission(&member) {
            Ok(()) => {
                self.members.push(member);
                self.emit(EventKind::Admitted { user: member.id });
                debug!("Total members: {}/{}", self.members.len(), self.capacity);
                true
            }
            Err(reason) => {
                self.emit(EventKind::Rejected {
                    user: member.id,
                    reason,
                });
                false
            }
        }
    }

    fn leave(&mut self, member: Member) -> bool {
        let Some(pos) = self.members.iter().position(|m| m.session == member.session) else {
            debug!("User {} is not in the Chat Server, nothing to remove", member.id);
            return false;
        };

        self.members.remove(pos);
        self.emit(EventKind::Left { user: member.id });
        true
    }

    async fn leave_all_rooms(&mut self, member: Member) -> bool {
        if !self.is_registered(&member) {
            return false;
        }

        for room in self.rooms.iter() {
            if let Err(e) = room.leave(member).await {
                warn!("User {} could not leave room: {}", member.id, e);
            }
        }
        self.leave(member)
    }

    async fn join_random_room(&mut self, member: Member) -> Result<bool, ChatError> {
        let id = random_side_room(&mut *self.rng, self.rooms.len());
        debug!("User {} picked Chat Room {}", member.id, id);
        self.rooms[id.0].enter(member).await
    }
}

/// Cloneable handle to a running ChatServer
#[derive(Debug, Clone)]
pub struct ServerHandle {
    capacity: usize,
    rooms: Arc<[RoomHandle]>,
    sender: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    /// Send a command and wait for the worker's reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ServerCommand,
    ) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| ChatError::ServerUnavailable)?;
        response.await.map_err(|_| ChatError::ServerUnavailable)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All rooms, in ID order
    pub fn rooms(&self) -> &[RoomHandle] {
        &self.rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Locate a room by ID
    pub fn room(&self, id: RoomId) -> Option<&RoomHandle> {
        self.rooms.iter().find(|room| room.id() == id)
    }

    /// The main room (always rooms[0])
    pub fn main_room(&self) -> &RoomHandle {
        &self.rooms[0]
    }

    pub async fn open(&self) -> Result<(), ChatError> {
        self.request(|reply| ServerCommand::Open { reply }).await
    }

    /// Close every room, clear the registry and close the server
    pub async fn close(&self) -> Result<(), ChatError> {
        self.request(|reply| ServerCommand::Close { reply }).await
    }

    /// Try to register a member; `false` means refused
    pub async fn join(&self, member: Member) -> Result<bool, ChatError> {
        self.request(|reply| ServerCommand::Join { member, reply })
            .await
    }

    /// Unregister a member (no-op if absent)
    pub async fn leave(&self, member: Member) -> Result<(), ChatError> {
        self.request(|reply| ServerCommand::Leave { member, reply })
            .await
            .map(|_| ())
    }

    /// If registered, leave every room and the registry in one server step
    ///
    /// Returns whether the member was registered.
    pub async fn leave_all_rooms(&self, member: Member) -> Result<bool, ChatError> {
        self.request(|reply| ServerCommand::LeaveAllRooms { member, reply })
            .await
    }

    /// Leave every room but stay registered with the server
    pub async fn leave_rooms(&self, member: Member) -> Result<(), ChatError> {
        for room in self.rooms.iter() {
            room.leave(member).await?;
        }
        Ok(())
    }

    /// Open a room by ID (no-op if unknown)
    pub async fn open_room(&self, id: RoomId) -> Result<(), ChatError> {
        match self.room(id) {
            Some(room) => room.open().await,
            None => {
                debug!("No Chat Room {} to open", id);
                Ok(())
            }
        }
    }

    /// Close a room by ID (no-op if unknown)
    pub async fn close_room(&self, id: RoomId) -> Result<(), ChatError> {
        match self.room(id) {
            Some(room) => room.close().await,
            None => {
                debug!("No Chat Room {} to close", id);
                Ok(())
            }
        }
    }

    /// Enter a room by ID; `false` if refused or unknown
    pub async fn enter_room(&self, member: Member, id: RoomId) -> Result<bool, ChatError> {
        match self.room(id) {
            Some(room) => room.enter(member).await,
            None => Ok(false),
        }
    }

    /// Leave a room by ID; `true` whenever the room exists
    pub async fn leave_room(&self, member: Member, id: RoomId) -> Result<bool, ChatError> {
        match self.room(id) {
            Some(room) => {
                room.leave(member).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a room is open; `false` for unknown IDs
    pub async fn is_room_open(&self, id: RoomId) -> Result<bool, ChatError> {
        match self.room(id) {
            Some(room) => room.is_open().await,
            None => Ok(false),
        }
    }

    pub async fn join_main_room(&self, member: Member) -> Result<bool, ChatError> {
        self.main_room().enter(member).await
    }

    /// Enter a uniformly chosen non-main room
    pub async fn join_random_room(&self, member: Member) -> Result<bool, ChatError> {
        self.request(|reply| ServerCommand::JoinRandomRoom { member, reply })
            .await?
    }

    pub async fn is_open(&self) -> Result<bool, ChatError> {
        self.request(|reply| ServerCommand::IsOpen { reply }).await
    }

    pub async fn members(&self) -> Result<Vec<Member>, ChatError> {
        self.request(|reply| ServerCommand::Members { reply }).await
    }

    pub async fn member_count(&self) -> Result<usize, ChatError> {
        Ok(self.members().await?.len())
    }
}
