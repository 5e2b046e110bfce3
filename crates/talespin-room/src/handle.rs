use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::config::RoomConfig;
use crate::deck::CardId;
use crate::message::ClientMessage;
use crate::room::Room;
use crate::room::RoomCommand;

/// Handle to a running room's mailbox. Cheap to clone, held by the
/// directory and by every connection hub session attached to the room.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    tx: UnboundedSender<RoomCommand>,
    closed: Arc<AtomicBool>,
}

impl RoomHandle {
    /// Spawns the room's task and returns a handle to it.
    pub fn spawn(
        room_id: String,
        creator: Option<String>,
        config: RoomConfig,
        registry: Arc<Vec<CardId>>,
        moderator_grace: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let room = Room::new(room_id.clone(), creator, config, registry, rx, moderator_grace, idle_timeout, closed.clone());
        tokio::spawn(room.run());
        Self { room_id, tx, closed }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn join(&self, name: String, token: String, password: Option<String>, tx: UnboundedSender<String>) -> Result<(), ()> {
        self.tx.send(RoomCommand::Join { name, token, password, tx }).map_err(|_| ())
    }

    pub fn send(&self, name: String, message: ClientMessage) -> Result<(), ()> {
        self.tx.send(RoomCommand::Message { name, message }).map_err(|_| ())
    }

    pub fn disconnect(&self, name: String) -> Result<(), ()> {
        self.tx.send(RoomCommand::Disconnect { name }).map_err(|_| ())
    }
}
