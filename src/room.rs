//! ChatRoom worker implementation
//!
//! Each room owns its open flag and occupant list inside a dedicated task.
//! Commands arrive over an `mpsc` channel and are processed one at a time,
//! so every operation on a room is exclusive with respect to that room only.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::ChatError;
use crate::event::{Entity, Event, EventKind, Rejection, SharedSink};
use crate::types::{Member, RoomId};

/// Channel buffer size for room commands
const CHANNEL_BUFFER_SIZE: usize = 64;

/// Commands sent from handles to a ChatRoom worker
#[derive(Debug)]
pub enum RoomCommand {
    /// Mark the room open
    Open { reply: oneshot::Sender<()> },
    /// Evict everyone, then mark the room closed
    Close { reply: oneshot::Sender<()> },
    /// Try to admit a member
    Enter {
        member: Member,
        reply: oneshot::Sender<bool>,
    },
    /// Remove a member if present
    Leave {
        member: Member,
        reply: oneshot::Sender<bool>,
    },
    /// Query the open flag
    IsOpen { reply: oneshot::Sender<bool> },
    /// Snapshot of current occupants
    Occupants { reply: oneshot::Sender<Vec<Member>> },
}

/// Room state, owned by its worker task
pub struct ChatRoom {
    id: RoomId,
    capacity: usize,
    is_open: bool,
    /// Current occupants, in admission order
    occupants: Vec<Member>,
    sink: SharedSink,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl ChatRoom {
    /// Create the room and start its worker on the current tokio runtime
    ///
    /// The room starts closed and empty.
    pub fn spawn(id: RoomId, capacity: usize, sink: SharedSink) -> Result<RoomHandle, ChatError> {
        if capacity == 0 {
            return Err(ChatError::InvalidCapacity);
        }

        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let room = Self {
            id,
            capacity,
            is_open: false,
            occupants: Vec::new(),
            sink,
            receiver,
        };
        tokio::spawn(room.run());

        Ok(RoomHandle {
            id,
            capacity,
            sender,
        })
    }

    /// Run the room event loop until every handle is dropped
    async fn run(mut self) {
        debug!("Chat Room {} started", self.id);

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Chat Room {} stopped", self.id);
    }

    /// Process a single command
    ///
    /// A dropped reply receiver only means the caller stopped waiting.
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Open { reply } => {
                self.open();
                let _ = reply.send(());
            }
            RoomCommand::Close { reply } => {
                self.close();
                let _ = reply.send(());
            }
            RoomCommand::Enter { member, reply } => {
                let _ = reply.send(self.enter(member));
            }
            RoomCommand::Leave { member, reply } => {
                let _ = reply.send(self.leave(member));
            }
            RoomCommand::IsOpen { reply } => {
                let _ = reply.send(self.is_open);
            }
            RoomCommand::Occupants { reply } => {
                let _ = reply.send(self.occupants.clone());
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        self.sink.emit(Event::new(Entity::Room(self.id), kind));
    }

    fn open(&mut self) {
        if !self.is_open {
            self.is_open = true;
            self.emit(EventKind::Opened);
        }
    }

    fn close(&mut self) {
        for member in std::mem::take(&mut self.occupants) {
            self.emit(EventKind::Left { user: member.id });
        }

        if self.is_open {
            self.is_open = false;
            self.emit(EventKind::Closed);
        }
    }

    /// Admission check
    ///
    /// Capacity is tested as `occupancy + 1 < capacity`, one tighter than the
    /// server's check. The open flag is not consulted.
    fn admission(&self, member: &Member) -> Result<(), Rejection> {
        if self.occupants.iter().any(|m| m.session == member.session) {
            return Err(Rejection::AlreadyPresent);
        }
        if self.occupants.len() + 1 >= self.capacity {
            return Err(Rejection::Full);
        }
        if self.occupants.iter().any(|m| m.same_id(member)) {
            return Err(Rejection::DuplicateId);
        }
        Ok(())
    }

    fn enter(&mut self, member: Member) -> bool {
        match self.admission(&member) {
            Ok(()) => {
                self.occupants.push(member);
                self.emit(EventKind::Admitted { user: member.id });
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
        let Some(pos) = self.occupants.iter().position(|m| m.session == member.session) else {
            return false;
        };

        self.occupants.remove(pos);
        self.emit(EventKind::Left { user: member.id });
        true
    }
}

/// Cloneable handle to a running ChatRoom
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    capacity: usize,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Send a command and wait for the worker's reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, ChatError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| ChatError::RoomUnavailable(self.id))?;
        response
            .await
            .map_err(|_| ChatError::RoomUnavailable(self.id))
    }

    /// Open the room (no-op if already open)
    pub async fn open(&self) -> Result<(), ChatError> {
        self.request(|reply| RoomCommand::Open { reply }).await
    }

    /// Evict every occupant and close the room
    pub async fn close(&self) -> Result<(), ChatError> {
        debug!("Chat Room {} is being closed", self.id);
        self.request(|reply| RoomCommand::Close { reply }).await
    }

    /// Try to admit a member; `false` means refused
    pub async fn enter(&self, member: Member) -> Result<bool, ChatError> {
        self.request(|reply| RoomCommand::Enter { member, reply })
            .await
    }

    /// Remove a member; returns whether they were present
    pub async fn leave(&self, member: Member) -> Result<bool, ChatError> {
        self.request(|reply| RoomCommand::Leave { member, reply })
            .await
    }

    pub async fn is_open(&self) -> Result<bool, ChatError> {
        self.request(|reply| RoomCommand::IsOpen { reply }).await
    }

    pub async fn occupants(&self) -> Result<Vec<Member>, ChatError> {
        self.request(|reply| RoomCommand::Occupants { reply }).await
    }

    pub async fn occupancy(&self) -> Result<usize, ChatError> {
        Ok(self.occupants().await?.len())
    }
}
