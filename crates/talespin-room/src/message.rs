use serde::Deserialize;
use serde::Serialize;

use crate::config::WinCondition;
use crate::deck::CardId;

/// Commands a client may send. Externally tagged: each wire object has
/// exactly one top-level key naming the variant, matching the protocol's
/// single-key convention rather than an internal `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClientMessage {
    CreateRoom { win_condition: WinCondition, creator_name: Option<String>, password: Option<String> },
    JoinRoom { room_id: String, name: String, token: String, password: Option<String> },
    Ready,
    StartGame,
    LeaveRoom,
    KickPlayer { player: String },
    SetModerator { player: String, enabled: bool },
    SetObserver { player: String, enabled: bool },
    RequestJoinFromObserver,
    SetAllowMidgameJoin { enabled: bool },
    SetStorytellerLossComplement { complement: u8 },
    SetVotesPerGuesser { votes: u8 },
    SetCardsPerHand { cards: u8 },
    SetNominationsPerGuesser { cards: u8 },
    ResumeGame,
    ActivePlayerChooseCard { card: CardId, description: String },
    PlayerChooseCards { cards: Vec<CardId> },
    SubmitVotes { cards: Vec<CardId> },
}

/// A single member as projected into a `RoomState` broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub name: String,
    pub kind: crate::member::MemberKind,
    pub status: crate::member::ConnStatus,
    pub points: i64,
    pub ready: bool,
    pub is_moderator: bool,
}

/// Events the server emits. Externally tagged to match `ClientMessage`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ServerMessage {
    RoomState {
        room_id: String,
        creator: Option<String>,
        members: Vec<MemberView>,
        stage: String,
        round_number: u32,
        active_player: Option<String>,
        deck_refill_count: u64,
        config: RoomConfigView,
    },
    StartRound {
        hand: Vec<CardId>,
    },
    PlayersChoose {
        hand: Vec<CardId>,
        description: String,
    },
    BeginVoting {
        center_cards: Vec<CardId>,
        description: String,
        disabled_cards: Vec<CardId>,
        votes_per_guesser: u8,
    },
    Results {
        player_to_current_cards: std::collections::HashMap<String, Vec<CardId>>,
        player_to_votes: std::collections::HashMap<String, Vec<CardId>>,
        active_card: CardId,
        point_change: std::collections::HashMap<String, i64>,
    },
    EndGame {
        winner: Option<String>,
    },
    ErrorMsg {
        reason: String,
    },
    InvalidRoomId,
    Kicked {
        reason: String,
    },
    LeftRoom {
        reason: String,
    },
}

/// Config surface exposed in `RoomState`, mirroring `RoomConfig` minus the
/// password (never echoed back to clients).
#[derive(Debug, Clone, Serialize)]
pub struct RoomConfigView {
    pub win_condition: WinCondition,
    pub has_password: bool,
    pub cards_per_hand: u8,
    pub votes_per_guesser: u8,
    pub nominations_per_guesser: u8,
    pub storyteller_loss_complement: u8,
    pub bonus_double_vote_on_threshold_correct_loss: bool,
    pub bonus_correct_guess_on_threshold_correct_loss: bool,
    pub allow_midgame_join: bool,
}

/// The zero-member `RoomState` a freshly created room starts from, before
/// any session has bound to a member. Shared by the HTTP `/create` handler
/// and the WebSocket `CreateRoom` frame, both of which allocate a room
/// without implying its creator has joined yet.
pub fn bare_room_state(room_id: String, creator: Option<String>, config: &crate::config::RoomConfig) -> ServerMessage {
    ServerMessage::RoomState {
        room_id,
        creator,
        members: Vec::new(),
        stage: "joining".to_string(),
        round_number: 0,
        active_player: None,
        deck_refill_count: 0,
        config: RoomConfigView::from(config),
    }
}

impl From<&crate::config::RoomConfig> for RoomConfigView {
    fn from(c: &crate::config::RoomConfig) -> Self {
        Self {
            win_condition: c.win_condition,
            has_password: c.password.is_some(),
            cards_per_hand: c.cards_per_hand,
            votes_per_guesser: c.votes_per_guesser,
            nominations_per_guesser: c.nominations_per_guesser,
            storyteller_loss_complement: c.storyteller_loss_complement,
            bonus_double_vote_on_threshold_correct_loss: c.bonus_double_vote_on_threshold_correct_loss,
            bonus_correct_guess_on_threshold_correct_loss: c.bonus_correct_guess_on_threshold_correct_loss,
            allow_midgame_join: c.allow_midgame_join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_parses_single_key_object() {
        let json = r#"{"JoinRoom":{"room_id":"ab12","name":"alice","token":"t1","password":null}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        matches!(msg, ClientMessage::JoinRoom { .. });
    }

    #[test]
    fn server_message_serializes_single_key_object() {
        let msg = ServerMessage::ErrorMsg { reason: "nope".to_string() };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"ErrorMsg":{"reason":"nope"}}"#);
    }

    #[test]
    fn unit_variant_serializes_as_bare_string() {
        let msg = ServerMessage::InvalidRoomId;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#""InvalidRoomId""#);
    }
}
