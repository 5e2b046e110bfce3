/// The win condition chosen at room creation. Configurable thereafter only
/// by a moderator, and only outside an in-flight round (see `Engine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WinCondition {
    /// Ends the first time any member reaches `target` points.
    Points { target: u32 },
    /// Ends after `target` rounds per currently-active player.
    Cycles { target: u32 },
    /// Ends the first round a full deal can no longer be completed.
    CardsFinish,
}

/// Tunable rules for a single room, set at creation and adjustable by a
/// moderator.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub win_condition: WinCondition,
    pub password: Option<String>,
    pub cards_per_hand: u8,
    pub votes_per_guesser: u8,
    pub nominations_per_guesser: u8,
    /// `C` in the scoring spec: shifts the storyteller-loss vote threshold.
    pub storyteller_loss_complement: u8,
    pub bonus_double_vote_on_threshold_correct_loss: bool,
    pub bonus_correct_guess_on_threshold_correct_loss: bool,
    pub allow_midgame_join: bool,
}

impl RoomConfig {
    pub fn new(win_condition: WinCondition, password: Option<String>) -> Self {
        Self {
            win_condition,
            password,
            cards_per_hand: 6,
            votes_per_guesser: 1,
            nominations_per_guesser: 1,
            storyteller_loss_complement: 0,
            bonus_double_vote_on_threshold_correct_loss: false,
            bonus_correct_guess_on_threshold_correct_loss: false,
            allow_midgame_join: true,
        }
    }
}
