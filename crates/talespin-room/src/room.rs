use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::RoomConfig;
use crate::deck::CardId;
use crate::engine::Engine;
use crate::event::Outgoing;
use crate::event::Recipient;
use crate::message::ClientMessage;
use crate::message::ServerMessage;
use crate::timer::ModeratorTimer;

const MODERATOR_TICK: Duration = Duration::from_secs(15);

/// Sent down a superseded session's channel right after its
/// `SupersededBySameToken` error, instead of a serialized `ServerMessage`.
/// Every real outgoing frame is JSON starting with `{`, so the bridge can
/// tell this apart from one and close the socket itself rather than
/// forwarding it as text — dropping the room's own sender clone doesn't
/// close the channel, since the bridge task holds a clone of its own for
/// the whole session.
pub const CLOSE_SENTINEL: &str = "\u{0}talespin-room:close\u{0}";

/// A command routed to a room's mailbox. The engine never sees a session
/// directly (see the crate's arena-plus-IDs design note): the hub resolves
/// a socket down to a member name, and the room resolves names back out to
/// sockets when fanning out `Outgoing` events.
pub enum RoomCommand {
    Join { name: String, token: String, password: Option<String>, tx: UnboundedSender<String> },
    Message { name: String, message: ClientMessage },
    Disconnect { name: String },
}

/// Imperative shell that owns `Engine` (functional core) and bridges it to
/// real sockets. One `Room` per mailbox, one mailbox per room code.
pub struct Room {
    engine: Engine,
    sessions: HashMap<String, UnboundedSender<String>>,
    inbox: UnboundedReceiver<RoomCommand>,
    moderator_timer: ModeratorTimer,
    moderator_grace: Duration,
    empty_since: Option<Instant>,
    idle_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl Room {
    pub fn new(
        room_id: String,
        creator: Option<String>,
        config: RoomConfig,
        registry: Arc<Vec<CardId>>,
        inbox: UnboundedReceiver<RoomCommand>,
        moderator_grace: Duration,
        idle_timeout: Duration,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine: Engine::new(room_id, creator, config, registry),
            sessions: HashMap::new(),
            inbox,
            moderator_timer: ModeratorTimer::new(moderator_grace),
            moderator_grace,
            empty_since: None,
            idle_timeout,
            closed,
        }
    }

    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(MODERATOR_TICK);
        loop {
            tokio::select! {
                biased;
                cmd = self.inbox.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if talespin_core::runtime::interrupted() {
                        break;
                    }
                    self.on_tick();
                    if self.idle_past_timeout() {
                        break;
                    }
                }
            }
        }
        self.closed.store(true, Ordering::Relaxed);
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { name, token, password, tx } => match self.engine.join(&name, &token, password.as_deref()) {
                Ok(events) => {
                    // A second session reconnecting with the same token supersedes
                    // whichever session currently occupies this member's seat.
                    // The close sentinel tells that session's bridge task to
                    // actually close the socket, not just stop hearing from it.
                    if let Some(old) = self.sessions.insert(name, tx) {
                        let _ = old.send(serialize(&ServerMessage::ErrorMsg {
                            reason: crate::error::EngineError::SupersededBySameToken.to_string(),
                        }));
                        let _ = old.send(CLOSE_SENTINEL.to_string());
                    }
                    self.fan_out(events);
                }
                Err(err) => {
                    let _ = tx.send(serialize(&ServerMessage::ErrorMsg { reason: err.to_string() }));
                }
            },
            RoomCommand::Message { name, message } => match self.dispatch_client_message(&name, message) {
                Ok(events) => self.fan_out(events),
                Err(err) => self.report_error(&name, err),
            },
            RoomCommand::Disconnect { name } => {
                self.sessions.remove(&name);
                if let Ok(events) = self.engine.disconnect(&name) {
                    self.fan_out(events);
                }
            }
        }
    }

    fn dispatch_client_message(&mut self, name: &str, message: ClientMessage) -> Result<Vec<Outgoing>, crate::error::EngineError> {
        use ClientMessage::*;
        match message {
            CreateRoom { .. } | JoinRoom { .. } => {
                log::warn!("room {}: {} sent a message the hub should never route into a room", self.engine.room_id, name);
                Err(crate::error::EngineError::PermissionDenied)
            }
            Ready => self.engine.ready(name),
            StartGame => self.engine.start_game(name),
            LeaveRoom => {
                let result = self.engine.leave(name);
                self.sessions.remove(name);
                result
            }
            KickPlayer { player } => self.engine.kick(name, &player),
            SetModerator { player, enabled } => self.engine.set_moderator(name, &player, enabled),
            SetObserver { player, enabled } => self.engine.set_observer(name, &player, enabled),
            RequestJoinFromObserver => self.engine.request_join_from_observer(name),
            SetAllowMidgameJoin { enabled } => self.engine.set_allow_midgame_join(name, enabled),
            SetStorytellerLossComplement { complement } => self.engine.set_storyteller_loss_complement(name, complement),
            SetVotesPerGuesser { votes } => self.engine.set_votes_per_guesser(name, votes),
            SetCardsPerHand { cards } => self.engine.set_cards_per_hand(name, cards),
            SetNominationsPerGuesser { cards } => self.engine.set_nominations_per_guesser(name, cards),
            ResumeGame => self.engine.resume_game(name),
            ActivePlayerChooseCard { card, description } => self.engine.active_player_choose_card(name, &card, &description),
            PlayerChooseCards { cards } => self.engine.player_choose_cards(name, &cards),
            SubmitVotes { cards } => self.engine.submit_votes(name, &cards),
        }
    }

    fn report_error(&mut self, name: &str, err: crate::error::EngineError) {
        if err.is_fatal() {
            log::error!("room {}: fatal invariant violated: {}", self.engine.room_id, err);
            std::process::abort();
        }
        self.send_to(name, &ServerMessage::ErrorMsg { reason: err.to_string() });
        if err.closes_session() {
            self.sessions.remove(name);
        }
    }

    fn fan_out(&mut self, events: Vec<Outgoing>) {
        for event in events {
            let json = serialize(&event.message);
            match event.to {
                Recipient::Broadcast => self.send_to_all(&json),
                Recipient::Member(name) => self.send_raw_to(&name, &json),
                Recipient::AllExcept(skip) => self.send_to_all_except(&skip, &json),
            }
        }
    }

    fn send_to(&mut self, name: &str, message: &ServerMessage) {
        self.send_raw_to(name, &serialize(message));
    }

    fn send_raw_to(&mut self, name: &str, json: &str) {
        let dead = match self.sessions.get(name) {
            Some(tx) => tx.send(json.to_string()).is_err(),
            None => false,
        };
        if dead {
            self.sessions.remove(name);
        }
    }

    fn send_to_all(&mut self, json: &str) {
        let mut dead = Vec::new();
        for (name, tx) in self.sessions.iter() {
            if tx.send(json.to_string()).is_err() {
                dead.push(name.clone());
            }
        }
        for name in dead {
            self.sessions.remove(&name);
        }
    }

    fn send_to_all_except(&mut self, skip: &str, json: &str) {
        let mut dead = Vec::new();
        for (name, tx) in self.sessions.iter() {
            if name == skip {
                continue;
            }
            if tx.send(json.to_string()).is_err() {
                dead.push(name.clone());
            }
        }
        for name in dead {
            self.sessions.remove(&name);
        }
    }

    fn on_tick(&mut self) {
        if self.engine.member_count() == 0 {
            self.moderator_timer.reset();
            return;
        }
        let has_moderator = self.engine.has_connected_moderator();
        if self.moderator_timer.tick(has_moderator) {
            let events = self.engine.auto_promote_moderator();
            self.fan_out(events);
            self.moderator_timer = ModeratorTimer::new(self.moderator_grace);
        }
    }

    fn idle_past_timeout(&mut self) -> bool {
        if self.engine.member_count() == 0 {
            let since = *self.empty_since.get_or_insert_with(Instant::now);
            since.elapsed() >= self.idle_timeout
        } else {
            self.empty_since = None;
            false
        }
    }
}

fn serialize(message: &ServerMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        log::error!("failed to serialize outgoing message: {e}");
        serde_json::to_string(&ServerMessage::ErrorMsg { reason: "internal serialization error".into() })
            .expect("ErrorMsg always serializes")
    })
}
