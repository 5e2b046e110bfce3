use std::collections::HashMap;

use crate::config::RoomConfig;
use crate::deck::CardId;

/// One guesser's submitted vote tokens for a single round.
pub struct GuesserVotes<'a> {
    pub name: &'a str,
    pub tokens: &'a [CardId],
}

/// Per-guesser nominated cards, used to compute decoy bonuses.
pub struct GuesserNomination<'a> {
    pub name: &'a str,
    pub cards: &'a [CardId],
}

/// The outcome of scoring a round: per-member point deltas and whether the
/// storyteller lost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub deltas: HashMap<String, i64>,
    pub storyteller_loss: bool,
    pub threshold_correct_loss: bool,
}

/// Scores one round per the room's configured rules.
///
/// `votes` and `nominations` must cover every guesser who participated;
/// `clue_card` is the storyteller's chosen card.
pub fn score_round(
    config: &RoomConfig,
    storyteller: &str,
    clue_card: &str,
    votes: &[GuesserVotes],
    nominations: &[GuesserNomination],
) -> RoundOutcome {
    let guesser_count = votes.len() as u32;
    let complement = config.storyteller_loss_complement.min(guesser_count as u8) as u32;
    let threshold = guesser_count.saturating_sub(complement);

    let mut right_tokens: HashMap<&str, u32> = HashMap::new();
    let mut wrong_tokens: HashMap<&str, u32> = HashMap::new();
    for v in votes {
        let right = v.tokens.iter().filter(|c| c.as_str() == clue_card).count() as u32;
        let wrong = v.tokens.len() as u32 - right;
        right_tokens.insert(v.name, right);
        wrong_tokens.insert(v.name, wrong);
    }

    let right_guessers = right_tokens.values().filter(|&&r| r >= 1).count() as u32;
    let wrong_guessers = wrong_tokens.values().filter(|&&w| w >= 1).count() as u32;

    let storyteller_loss = right_guessers >= threshold || wrong_guessers >= threshold;
    let threshold_correct_loss = storyteller_loss && right_guessers >= threshold;

    let mut deltas: HashMap<String, i64> = HashMap::new();

    let storyteller_delta: i64 = if storyteller_loss { 0 } else { 3 };
    deltas.insert(storyteller.to_string(), storyteller_delta);

    // Decoy bonuses: for each guesser's nominated card, count vote tokens any
    // *other* guesser placed on it, capped at +3 total per nominator.
    let mut decoy: HashMap<&str, i64> = HashMap::new();
    for nom in nominations {
        let mut earned = 0i64;
        for card in nom.cards {
            for v in votes {
                if v.name == nom.name {
                    continue;
                }
                earned += v.tokens.iter().filter(|c| c.as_str() == card.as_str()).count() as i64;
            }
        }
        decoy.insert(nom.name, earned.min(3));
    }

    for v in votes {
        let right = *right_tokens.get(v.name).unwrap_or(&0);
        let mut delta: i64 = if storyteller_loss {
            2
        } else if right >= 1 {
            3
        } else {
            0
        };

        if storyteller_loss
            && threshold_correct_loss
            && config.bonus_correct_guess_on_threshold_correct_loss
            && right >= 1
        {
            delta = 3;
        }

        let double_correct_allowed = !(storyteller_loss && threshold_correct_loss)
            || config.bonus_double_vote_on_threshold_correct_loss;
        if right >= 2 && double_correct_allowed {
            delta += 1;
        }

        delta += decoy.get(v.name).copied().unwrap_or(0);

        *deltas.entry(v.name.to_string()).or_insert(0) += delta;
    }

    RoundOutcome {
        deltas,
        storyteller_loss,
        threshold_correct_loss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WinCondition;

    fn default_config() -> RoomConfig {
        RoomConfig::new(WinCondition::Points { target: 10 }, None)
    }

    #[test]
    fn scenario_one_basic_round_no_loss() {
        let config = default_config();
        let (g1_tok, g2_tok, g3_tok) = (["x".to_string()], ["a".to_string()], ["x".to_string()]);
        let votes = vec![
            GuesserVotes { name: "g1", tokens: &g1_tok },
            GuesserVotes { name: "g2", tokens: &g2_tok },
            GuesserVotes { name: "g3", tokens: &g3_tok },
        ];
        let (g1_card, g2_card, g3_card) = (["a".to_string()], ["b".to_string()], ["c".to_string()]);
        let noms = vec![
            GuesserNomination { name: "g1", cards: &g1_card },
            GuesserNomination { name: "g2", cards: &g2_card },
            GuesserNomination { name: "g3", cards: &g3_card },
        ];
        let outcome = score_round(&config, "storyteller", "x", &votes, &noms);
        assert!(!outcome.storyteller_loss);
        assert_eq!(outcome.deltas["storyteller"], 3);
        // base 3 (right) + 1 decoy: g2's vote for "a" lands on g1's nomination.
        assert_eq!(outcome.deltas["g1"], 4);
        assert_eq!(outcome.deltas["g2"], 0);
        assert_eq!(outcome.deltas["g3"], 3);
    }

    #[test]
    fn scenario_two_storyteller_loss_by_all_correct() {
        let config = default_config();
        let (g1_tok, g2_tok, g3_tok) = (["x".to_string()], ["x".to_string()], ["x".to_string()]);
        let votes = vec![
            GuesserVotes { name: "g1", tokens: &g1_tok },
            GuesserVotes { name: "g2", tokens: &g2_tok },
            GuesserVotes { name: "g3", tokens: &g3_tok },
        ];
        let (g1_card, g2_card, g3_card) = (["a".to_string()], ["b".to_string()], ["c".to_string()]);
        let noms = vec![
            GuesserNomination { name: "g1", cards: &g1_card },
            GuesserNomination { name: "g2", cards: &g2_card },
            GuesserNomination { name: "g3", cards: &g3_card },
        ];
        let outcome = score_round(&config, "storyteller", "x", &votes, &noms);
        assert!(outcome.storyteller_loss);
        assert!(outcome.threshold_correct_loss);
        assert_eq!(outcome.deltas["storyteller"], 0);
        assert_eq!(outcome.deltas["g1"], 2);
        assert_eq!(outcome.deltas["g2"], 2);
        assert_eq!(outcome.deltas["g3"], 2);
    }

    #[test]
    fn double_correct_bonus_applies_outside_threshold_loss() {
        let mut config = default_config();
        config.votes_per_guesser = 2;
        // Two guessers so that right_guessers (1) stays below threshold (2).
        let (g1_tok, g2_tok) = (["x".to_string(), "x".to_string()], ["a".to_string(), "b".to_string()]);
        let votes = vec![
            GuesserVotes { name: "g1", tokens: &g1_tok },
            GuesserVotes { name: "g2", tokens: &g2_tok },
        ];
        let (g1_card, g2_card) = (["a".to_string()], ["b".to_string()]);
        let noms = vec![
            GuesserNomination { name: "g1", cards: &g1_card },
            GuesserNomination { name: "g2", cards: &g2_card },
        ];
        let outcome = score_round(&config, "storyteller", "x", &votes, &noms);
        assert!(!outcome.storyteller_loss);
        // base 3 (>=1 right) + 1 (double-correct) + 1 decoy (g2's vote for "a" lands on g1's nomination)
        assert_eq!(outcome.deltas["g1"], 5);
    }

    #[test]
    fn decoy_bonus_is_capped_at_three() {
        let mut config = default_config();
        config.nominations_per_guesser = 1;
        let (g1_tok, g2_tok, g3_tok, g4_tok, g5_tok) = (
            ["z".to_string()],
            ["a".to_string()],
            ["a".to_string()],
            ["a".to_string()],
            ["a".to_string()],
        );
        let votes = vec![
            GuesserVotes { name: "g1", tokens: &g1_tok },
            GuesserVotes { name: "g2", tokens: &g2_tok },
            GuesserVotes { name: "g3", tokens: &g3_tok },
            GuesserVotes { name: "g4", tokens: &g4_tok },
            GuesserVotes { name: "g5", tokens: &g5_tok },
        ];
        let (g1_card, g2_card, g3_card, g4_card, g5_card) = (
            ["a".to_string()],
            ["b".to_string()],
            ["c".to_string()],
            ["d".to_string()],
            ["e".to_string()],
        );
        let noms = vec![
            GuesserNomination { name: "g1", cards: &g1_card },
            GuesserNomination { name: "g2", cards: &g2_card },
            GuesserNomination { name: "g3", cards: &g3_card },
            GuesserNomination { name: "g4", cards: &g4_card },
            GuesserNomination { name: "g5", cards: &g5_card },
        ];
        // storyteller-loss check: threshold = 5, right_guessers = 0, wrong_guessers = 5 -> loss
        let outcome = score_round(&config, "storyteller", "x", &votes, &noms);
        assert!(outcome.storyteller_loss);
        assert!(!outcome.threshold_correct_loss);
        // g1's card "a" got 4 external votes (g2..g5), capped at 3, plus base 2 (loss round)
        assert_eq!(outcome.deltas["g1"], 5);
    }

    #[test]
    fn threshold_correct_upgrade_bonus_when_enabled() {
        let mut config = default_config();
        config.bonus_correct_guess_on_threshold_correct_loss = true;
        let (g1_tok, g2_tok, g3_tok) = (["x".to_string()], ["x".to_string()], ["x".to_string()]);
        let votes = vec![
            GuesserVotes { name: "g1", tokens: &g1_tok },
            GuesserVotes { name: "g2", tokens: &g2_tok },
            GuesserVotes { name: "g3", tokens: &g3_tok },
        ];
        let (g1_card, g2_card, g3_card) = (["a".to_string()], ["b".to_string()], ["c".to_string()]);
        let noms = vec![
            GuesserNomination { name: "g1", cards: &g1_card },
            GuesserNomination { name: "g2", cards: &g2_card },
            GuesserNomination { name: "g3", cards: &g3_card },
        ];
        let outcome = score_round(&config, "storyteller", "x", &votes, &noms);
        assert!(outcome.threshold_correct_loss);
        assert_eq!(outcome.deltas["g1"], 3);
    }
}
