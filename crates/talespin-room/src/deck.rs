use std::collections::HashSet;
use std::collections::VecDeque;

pub type CardId = String;

/// A room's card lifecycle: a draw pile, the set of cards currently in play
/// (in a hand, chosen as the clue, or on the table), and a discard set of
/// cards retired at the end of a round.
///
/// Invariant: `draw ∪ in_play ∪ discard` is a subset of the process card
/// registry, and the three are pairwise disjoint.
#[derive(Debug, Clone)]
pub struct Deck {
    draw: VecDeque<CardId>,
    in_play: HashSet<CardId>,
    discard: HashSet<CardId>,
    pub refill_count: u64,
}

impl Deck {
    pub fn new(mut all_cards: Vec<CardId>) -> Self {
        use rand::seq::SliceRandom;
        all_cards.shuffle(&mut rand::rng());
        Self {
            draw: all_cards.into(),
            in_play: HashSet::new(),
            discard: HashSet::new(),
            refill_count: 0,
        }
    }

    pub fn draw_len(&self) -> usize {
        self.draw.len()
    }

    /// Draws up to `n` cards, moving them into `in_play`. Fewer than `n` may
    /// be returned if the pile runs dry.
    pub fn draw(&mut self, n: usize) -> Vec<CardId> {
        let mut drawn = Vec::with_capacity(n);
        for _ in 0..n {
            match self.draw.pop_front() {
                Some(card) => {
                    self.in_play.insert(card.clone());
                    drawn.push(card);
                }
                None => break,
            }
        }
        drawn
    }

    /// Tops up the draw pile from registry cards not currently in any hand,
    /// on the table, or already in the pile. Increments `refill_count`.
    pub fn refill(&mut self, registry_cards: &[CardId]) {
        let mut fresh: Vec<CardId> = registry_cards
            .iter()
            .filter(|c| !self.in_play.contains(*c) && !self.draw.contains(*c) && !self.discard.contains(*c))
            .cloned()
            .collect();
        use rand::seq::SliceRandom;
        fresh.shuffle(&mut rand::rng());
        self.draw.extend(fresh);
        self.refill_count += 1;
    }

    /// Reclaims discarded cards back into the draw pile's refill candidates
    /// by simply forgetting them (they rejoin `registry_cards` minus
    /// `in_play` the next time `refill` runs).
    pub fn discard(&mut self, cards: impl IntoIterator<Item = CardId>) {
        for card in cards {
            self.in_play.remove(&card);
            self.discard.insert(card);
        }
    }

    /// Returns a specific card from `in_play` directly to the discard pile,
    /// used when a hand is abandoned (member left/kicked mid-round).
    pub fn abandon_hand(&mut self, hand: Vec<CardId>) {
        self.discard(hand);
    }

    pub fn is_in_play(&self, card: &str) -> bool {
        self.in_play.contains(card)
    }

    pub fn available_to_deal(&self) -> usize {
        self.draw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(n: usize) -> Vec<CardId> {
        (0..n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn draw_moves_cards_into_play() {
        let mut deck = Deck::new(cards(5));
        let hand = deck.draw(3);
        assert_eq!(hand.len(), 3);
        assert_eq!(deck.draw_len(), 2);
        for c in &hand {
            assert!(deck.is_in_play(c));
        }
    }

    #[test]
    fn draw_returns_fewer_when_pile_runs_dry() {
        let mut deck = Deck::new(cards(2));
        let hand = deck.draw(5);
        assert_eq!(hand.len(), 2);
        assert_eq!(deck.draw_len(), 0);
    }

    #[test]
    fn refill_only_pulls_cards_not_currently_held() {
        let registry = cards(10);
        let mut deck = Deck::new(registry.clone());
        let held = deck.draw(10);
        assert_eq!(deck.draw_len(), 0);
        assert_eq!(deck.refill_count, 0);
        deck.refill(&registry);
        assert_eq!(deck.refill_count, 1);
        // every held card is still in play, so none can appear in the fresh pile
        for c in &held {
            assert!(!deck.draw.contains(c));
        }
        assert_eq!(deck.draw_len(), 0);
    }

    #[test]
    fn discarded_cards_are_eligible_for_refill_again() {
        let registry = cards(4);
        let mut deck = Deck::new(registry.clone());
        let hand = deck.draw(4);
        deck.discard(hand);
        deck.refill(&registry);
        assert_eq!(deck.draw_len(), 4);
    }
}
