use std::collections::HashMap;
use std::collections::HashSet;

use crate::deck::CardId;

/// Where a room sits in the round pipeline.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum Stage {
    /// No round in flight; members can still be promoted/demoted and config
    /// can still be changed.
    Joining,
    /// The active storyteller is picking a clue card and writing a clue.
    ActiveChooses,
    /// Every other active player is nominating cards to match the clue.
    PlayersChoose,
    /// Nominated cards (plus the clue card) are on the table; guessers vote.
    Voting,
    /// Votes are in; scoring has run and results are visible.
    Results,
    /// The round is frozen because the moderator disconnected and no other
    /// active player has claimed the seat yet.
    Paused { reason: String },
    /// A win condition has been met; the room no longer accepts round input.
    End,
}

impl Stage {
    pub fn accepts_choose_card(&self) -> bool {
        matches!(self, Stage::ActiveChooses)
    }

    pub fn accepts_nominations(&self) -> bool {
        matches!(self, Stage::PlayersChoose)
    }

    pub fn accepts_votes(&self) -> bool {
        matches!(self, Stage::Voting)
    }

    /// True only while cards are actually out of the discard pile for this
    /// round (clue card drawn, nominations held by guessers). `Results` has
    /// already discarded everything via `finish_round`, so it is excluded
    /// even though no new round has started yet.
    pub fn is_round_in_flight(&self) -> bool {
        matches!(self, Stage::ActiveChooses | Stage::PlayersChoose | Stage::Voting)
    }

    /// True whenever the active-player headcount must stay at or above 3
    /// (the §3 data-model invariant), including `Results` — a round just
    /// ended but the next one still needs enough players to deal into.
    pub fn requires_quorum(&self) -> bool {
        !matches!(self, Stage::Joining | Stage::Paused { .. } | Stage::End)
    }
}

/// Round-private state, reset at the start of every round. Not serialized
/// wholesale: `Engine::snapshot` projects the parts relevant to the current
/// stage into a `ServerMessage`.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    pub storyteller: Option<String>,
    pub clue: Option<String>,
    pub clue_card: Option<CardId>,
    /// Guesser name -> the cards they nominated to match the clue.
    pub nominations: HashMap<String, Vec<CardId>>,
    /// Guesser name -> the cards on the table they voted for.
    pub votes: HashMap<String, Vec<CardId>>,
    /// The shuffled table of clue card + every nominated card, revealed at
    /// the start of `Voting`.
    pub table: Vec<CardId>,
    /// Per-guesser cards they may not vote for again after a prior illegal
    /// attempt was rejected (kept for symmetry; currently always empty,
    /// since illegal votes are rejected outright rather than partially
    /// recorded).
    pub disabled: HashMap<String, HashSet<CardId>>,
}

impl RoundState {
    pub fn new(storyteller: String) -> Self {
        Self {
            storyteller: Some(storyteller),
            ..Default::default()
        }
    }

    pub fn nominators_remaining(&self, active_guessers: &[String]) -> Vec<String> {
        active_guessers
            .iter()
            .filter(|name| !self.nominations.contains_key(*name))
            .cloned()
            .collect()
    }

    pub fn voters_remaining(&self, active_guessers: &[String]) -> Vec<String> {
        active_guessers
            .iter()
            .filter(|name| !self.votes.contains_key(*name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_gates_match_pipeline_position() {
        assert!(Stage::ActiveChooses.accepts_choose_card());
        assert!(!Stage::Voting.accepts_choose_card());
        assert!(Stage::PlayersChoose.accepts_nominations());
        assert!(Stage::Voting.accepts_votes());
        assert!(!Stage::Joining.is_round_in_flight());
        assert!(!Stage::End.is_round_in_flight());
        assert!(!Stage::Results.is_round_in_flight());
        assert!(Stage::Voting.is_round_in_flight());
        assert!(!Stage::Joining.requires_quorum());
        assert!(!Stage::End.requires_quorum());
        assert!(Stage::Results.requires_quorum());
    }

    #[test]
    fn remaining_lists_shrink_as_entries_are_recorded() {
        let mut round = RoundState::new("alice".into());
        let guessers = vec!["bob".to_string(), "carol".to_string()];
        assert_eq!(round.nominators_remaining(&guessers), guessers);
        round.nominations.insert("bob".into(), vec!["c1".into()]);
        assert_eq!(round.nominators_remaining(&guessers), vec!["carol".to_string()]);
    }
}
