use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::seq::SliceRandom;

use crate::config::RoomConfig;
use crate::config::WinCondition;
use crate::deck::CardId;
use crate::deck::Deck;
use crate::error::EngineError;
use crate::event::Outgoing;
use crate::member::ConnStatus;
use crate::member::Member;
use crate::member::MemberKind;
use crate::message::MemberView;
use crate::message::RoomConfigView;
use crate::message::ServerMessage;
use crate::scoring;
use crate::scoring::GuesserNomination;
use crate::scoring::GuesserVotes;
use crate::stage::RoundState;
use crate::stage::Stage;

/// The synchronous functional core of a room. Holds every piece of state
/// named in the data model and applies one command at a time, returning the
/// events that command produced. Performs no I/O and owns no clock or
/// socket; the asynchronous `Room` actor wraps this to give it a mailbox,
/// a moderator-continuity timer, and a fan-out layer.
pub struct Engine {
    pub room_id: String,
    pub creator: Option<String>,
    moderators: HashSet<String>,
    members: Vec<Member>,
    pub config: RoomConfig,
    pub stage: Stage,
    pub round_number: u32,
    deck: Deck,
    hands: HashMap<String, Vec<CardId>>,
    round: RoundState,
    registry: Arc<Vec<CardId>>,
}

type Commanded = Result<Vec<Outgoing>, EngineError>;

impl Engine {
    pub fn new(room_id: String, creator: Option<String>, config: RoomConfig, registry: Arc<Vec<CardId>>) -> Self {
        let all_cards = registry.as_ref().clone();
        Self {
            room_id,
            creator,
            moderators: HashSet::new(),
            members: Vec::new(),
            config,
            stage: Stage::Joining,
            round_number: 0,
            deck: Deck::new(all_cards),
            hands: HashMap::new(),
            round: RoundState::default(),
            registry,
        }
    }

    // ---- roster queries -------------------------------------------------

    fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }

    fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    fn is_moderator(&self, name: &str) -> bool {
        self.moderators.contains(name)
    }

    fn active_player_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_active()).count()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_connected_moderator(&self) -> bool {
        self.members.iter().any(|m| m.is_connected() && self.moderators.contains(&m.name))
    }

    /// Promotes a uniformly random currently-connected member (active or
    /// observer) to moderator. No-op if nobody is connected.
    pub fn auto_promote_moderator(&mut self) -> Vec<Outgoing> {
        let candidates: Vec<String> = self.members.iter().filter(|m| m.is_connected()).map(|m| m.name.clone()).collect();
        let Some(chosen) = candidates.choose(&mut rand::rng()) else {
            return vec![];
        };
        self.moderators.insert(chosen.clone());
        log::info!("room {} auto-promoted {} to moderator after losing moderator coverage", self.room_id, chosen);
        vec![self.broadcast_snapshot()]
    }

    /// Active, non-storyteller members currently taking part in a round, in
    /// join order. Used to check round-completion and drive scoring.
    fn active_guessers(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.is_active())
            .filter(|m| Some(&m.name) != self.round.storyteller.as_ref())
            .map(|m| m.name.clone())
            .collect()
    }

    fn connected_active_in_join_order(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.is_active() && m.is_connected())
            .map(|m| m.name.clone())
            .collect()
    }

    // ---- roster commands --------------------------------------------------

    pub fn join(&mut self, name: &str, token: &str, password: Option<&str>) -> Commanded {
        if let Some(existing) = self.member(name) {
            if existing.client_token == token {
                self.member_mut(name).unwrap().status = ConnStatus::Connected;
                return Ok(vec![self.broadcast_snapshot()]);
            }
            return Err(EngineError::NameAlreadyTaken);
        }

        if let Some(expected) = &self.config.password {
            if password != Some(expected.as_str()) {
                return Err(EngineError::BadPassword);
            }
        }

        if !self.config.allow_midgame_join && !matches!(self.stage, Stage::Joining) {
            return Err(EngineError::JoinsDisabled);
        }

        let safe_stage = matches!(self.stage, Stage::Joining | Stage::Paused { .. });
        let kind = if safe_stage { MemberKind::Active } else { MemberKind::Observer };
        let mut member = Member::new(name.to_string(), token.to_string(), kind);
        if !safe_stage {
            member.auto_join_on_next_round = true;
        }
        self.members.push(member);
        if self.creator.as_deref() == Some(name) {
            self.moderators.insert(name.to_string());
        }

        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn leave(&mut self, name: &str) -> Commanded {
        if self.member(name).is_none() {
            return Err(EngineError::UnknownMember);
        }
        let mut out = self.remove_member(name)?;
        out.push(Outgoing::to(name, ServerMessage::LeftRoom { reason: "left the room".into() }));
        Ok(out)
    }

    pub fn kick(&mut self, requester: &str, target: &str) -> Commanded {
        self.require_moderator(requester)?;
        if self.member(target).is_none() {
            return Err(EngineError::UnknownMember);
        }
        let mut out = self.remove_member(target)?;
        out.push(Outgoing::to(target, ServerMessage::Kicked { reason: "removed by a moderator".into() }));
        Ok(out)
    }

    /// Shared teardown for leave/kick: drops membership, reclaims their
    /// hand, rotates off the storyteller seat or pauses the round as
    /// needed.
    fn remove_member(&mut self, name: &str) -> Commanded {
        let was_storyteller = self.round.storyteller.as_deref() == Some(name);
        let round_in_flight = self.stage.is_round_in_flight();
        let needs_quorum = self.stage.requires_quorum();

        if let Some(hand) = self.hands.remove(name) {
            self.deck.abandon_hand(hand);
        }
        self.round.nominations.remove(name);
        self.round.votes.remove(name);
        self.members.retain(|m| m.name != name);
        self.moderators.remove(name);

        let mut out = Vec::new();
        if self.active_player_count() < 3 && needs_quorum {
            out.extend(self.enter_pause("Need at least 3 active players.".to_string()));
        } else if was_storyteller && round_in_flight {
            out.extend(self.cancel_round_for_departed_storyteller()?);
        } else {
            out.push(self.broadcast_snapshot());
            out.extend(self.advance_round_if_now_complete()?);
        }
        Ok(out)
    }

    /// A departing guesser may have been the last one a `PlayersChoose` or
    /// `Voting` stage was waiting on; re-check completion so the round
    /// doesn't stall waiting for input from someone no longer in the room.
    fn advance_round_if_now_complete(&mut self) -> Commanded {
        let guessers = self.active_guessers();
        match self.stage {
            Stage::PlayersChoose if self.round.nominators_remaining(&guessers).is_empty() && !guessers.is_empty() => {
                self.enter_voting(&guessers)
            }
            Stage::Voting if self.round.voters_remaining(&guessers).is_empty() && !guessers.is_empty() => {
                self.finish_round(&guessers)
            }
            _ => Ok(vec![]),
        }
    }

    pub fn disconnect(&mut self, name: &str) -> Commanded {
        let member = self.member_mut(name).ok_or(EngineError::UnknownMember)?;
        member.status = ConnStatus::Disconnected;
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_moderator(&mut self, requester: &str, target: &str, enabled: bool) -> Commanded {
        self.require_moderator(requester)?;
        if self.member(target).is_none() {
            return Err(EngineError::UnknownMember);
        }
        if enabled {
            self.moderators.insert(target.to_string());
        } else {
            self.moderators.remove(target);
        }
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_observer(&mut self, requester: &str, target: &str, enabled: bool) -> Commanded {
        self.require_moderator(requester)?;
        let storyteller_in_flight = self.round.storyteller.as_deref() == Some(target)
            && matches!(self.stage, Stage::ActiveChooses | Stage::PlayersChoose | Stage::Voting);
        if enabled && storyteller_in_flight {
            return Err(EngineError::StageForbidsAction);
        }
        let member = self.member_mut(target).ok_or(EngineError::UnknownMember)?;
        if enabled {
            member.kind = MemberKind::Observer;
            if let Some(hand) = self.hands.remove(target) {
                self.deck.abandon_hand(hand);
            }
        } else {
            member.kind = MemberKind::Active;
        }
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn request_join_from_observer(&mut self, name: &str) -> Commanded {
        let safe_stage = matches!(self.stage, Stage::Joining | Stage::Paused { .. });
        let member = self.member_mut(name).ok_or(EngineError::UnknownMember)?;
        if member.is_active() {
            return Err(EngineError::StageForbidsAction);
        }
        if safe_stage {
            member.kind = MemberKind::Active;
        } else {
            member.auto_join_on_next_round = true;
        }
        Ok(vec![self.broadcast_snapshot()])
    }

    fn require_moderator(&self, name: &str) -> Result<(), EngineError> {
        if self.is_moderator(name) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied)
        }
    }

    fn require_joining_or_paused(&self) -> Result<(), EngineError> {
        if matches!(self.stage, Stage::Joining | Stage::Paused { .. }) {
            Ok(())
        } else {
            Err(EngineError::StageForbidsAction)
        }
    }

    // ---- config commands ----------------------------------------------

    pub fn set_allow_midgame_join(&mut self, requester: &str, enabled: bool) -> Commanded {
        self.require_moderator(requester)?;
        self.config.allow_midgame_join = enabled;
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_storyteller_loss_complement(&mut self, requester: &str, complement: u8) -> Commanded {
        self.require_moderator(requester)?;
        self.require_joining_or_paused()?;
        self.config.storyteller_loss_complement = complement;
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_votes_per_guesser(&mut self, requester: &str, votes: u8) -> Commanded {
        self.require_moderator(requester)?;
        self.require_joining_or_paused()?;
        self.config.votes_per_guesser = votes.clamp(1, 12);
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_cards_per_hand(&mut self, requester: &str, cards: u8) -> Commanded {
        self.require_moderator(requester)?;
        self.require_joining_or_paused()?;
        self.config.cards_per_hand = cards.clamp(1, 12);
        Ok(vec![self.broadcast_snapshot()])
    }

    pub fn set_nominations_per_guesser(&mut self, requester: &str, cards: u8) -> Commanded {
        self.require_moderator(requester)?;
        self.require_joining_or_paused()?;
        self.config.nominations_per_guesser = cards.clamp(1, 12);
        Ok(vec![self.broadcast_snapshot()])
    }

    // ---- lifecycle -------------------------------------------------------

    pub fn start_game(&mut self, requester: &str) -> Commanded {
        self.require_moderator(requester)?;
        if !matches!(self.stage, Stage::Joining) {
            return Err(EngineError::StageForbidsAction);
        }
        if self.active_player_count() < 3 {
            return Err(EngineError::NotEnoughPlayers);
        }
        self.round_number = 0;
        self.start_round()
    }

    pub fn resume_game(&mut self, requester: &str) -> Commanded {
        self.require_moderator(requester)?;
        if !matches!(self.stage, Stage::Paused { .. }) {
            return Err(EngineError::StageForbidsAction);
        }
        if self.active_player_count() < 3 {
            return Err(EngineError::NotEnoughPlayers);
        }
        self.start_round()
    }

    pub fn ready(&mut self, name: &str) -> Commanded {
        let stage_allows = matches!(self.stage, Stage::Joining | Stage::Results);
        let member = self.member_mut(name).ok_or(EngineError::UnknownMember)?;
        if !stage_allows {
            return Err(EngineError::StageForbidsAction);
        }
        member.ready = true;

        if matches!(self.stage, Stage::Results) {
            let active: Vec<String> = self.members.iter().filter(|m| m.is_active()).map(|m| m.name.clone()).collect();
            let all_ready = active.iter().all(|n| self.member(n).map(|m| m.ready).unwrap_or(false));
            if all_ready {
                for n in &active {
                    if let Some(m) = self.member_mut(n) {
                        m.ready = false;
                    }
                }
                return self.start_round();
            }
        }
        Ok(vec![self.broadcast_snapshot()])
    }

    // ---- round pipeline ----------------------------------------------

    fn promote_pending_observers(&mut self) {
        for m in self.members.iter_mut() {
            if m.auto_join_on_next_round {
                m.kind = MemberKind::Active;
                m.auto_join_on_next_round = false;
            }
        }
    }

    fn start_round(&mut self) -> Commanded {
        self.promote_pending_observers();

        let active: Vec<String> = self.members.iter().filter(|m| m.is_active()).map(|m| m.name.clone()).collect();
        if active.len() < 3 {
            return Err(EngineError::InternalInvariant("start_round with fewer than 3 active players".into()));
        }

        let target = self.config.cards_per_hand as usize;
        let needed: usize = active
            .iter()
            .map(|n| target.saturating_sub(self.hands.get(n).map(|h| h.len()).unwrap_or(0)))
            .sum();

        if self.deck.available_to_deal() < needed {
            self.deck.refill(&self.registry);
        }
        if self.deck.available_to_deal() < needed {
            if matches!(self.config.win_condition, WinCondition::CardsFinish) {
                self.stage = Stage::End;
                return Ok(vec![self.broadcast_snapshot(), Outgoing::broadcast(ServerMessage::EndGame { winner: self.leader() })]);
            }
            // points/cycles: deal whatever remains; the deficiency is a
            // misconfiguration (registry too small for the room), not a
            // reason to end the game.
        }

        for name in &active {
            let deficit = target.saturating_sub(self.hands.get(name).map(|h| h.len()).unwrap_or(0));
            let drawn = self.deck.draw(deficit);
            self.hands.entry(name.clone()).or_default().extend(drawn);
        }

        let rotation = self.connected_active_in_join_order();
        let storyteller = if rotation.is_empty() {
            active[0].clone()
        } else {
            rotation[(self.round_number as usize) % rotation.len()].clone()
        };

        self.round = RoundState::new(storyteller.clone());
        self.stage = Stage::ActiveChooses;

        let hand = self.hands.get(&storyteller).cloned().unwrap_or_default();
        Ok(vec![self.broadcast_snapshot(), Outgoing::to(storyteller, ServerMessage::StartRound { hand })])
    }

    pub fn active_player_choose_card(&mut self, name: &str, card: &str, description: &str) -> Commanded {
        if !self.stage.accepts_choose_card() {
            return Err(EngineError::StageForbidsAction);
        }
        if self.round.storyteller.as_deref() != Some(name) {
            return Err(EngineError::PermissionDenied);
        }
        if description.trim().is_empty() {
            return Err(EngineError::StageForbidsAction);
        }
        let hand = self.hands.get_mut(name).ok_or(EngineError::CardNotInHand)?;
        let idx = hand.iter().position(|c| c == card).ok_or(EngineError::CardNotInHand)?;
        hand.remove(idx);

        self.round.clue_card = Some(card.to_string());
        self.round.clue = Some(description.to_string());
        self.stage = Stage::PlayersChoose;

        let mut out = vec![self.broadcast_snapshot()];
        let description = description.to_string();
        for guesser in self.active_guessers() {
            let hand = self.hands.get(&guesser).cloned().unwrap_or_default();
            out.push(Outgoing::to(guesser, ServerMessage::PlayersChoose { hand, description: description.clone() }));
        }
        Ok(out)
    }

    pub fn player_choose_cards(&mut self, name: &str, cards: &[CardId]) -> Commanded {
        if !self.stage.accepts_nominations() {
            return Err(EngineError::StageForbidsAction);
        }
        if self.round.storyteller.as_deref() == Some(name) {
            return Err(EngineError::PermissionDenied);
        }
        if self.round.nominations.contains_key(name) {
            return Err(EngineError::StageForbidsAction);
        }
        if cards.len() != self.config.nominations_per_guesser as usize {
            return Err(EngineError::WrongVoteCount);
        }
        let unique: HashSet<&CardId> = cards.iter().collect();
        if unique.len() != cards.len() {
            return Err(EngineError::DuplicateNomination);
        }
        let hand = self.hands.get_mut(name).ok_or(EngineError::CardNotInHand)?;
        for card in cards {
            if !hand.contains(card) {
                return Err(EngineError::CardNotInHand);
            }
        }
        hand.retain(|c| !cards.contains(c));
        self.round.nominations.insert(name.to_string(), cards.to_vec());

        let guessers = self.active_guessers();
        if !self.round.nominators_remaining(&guessers).is_empty() {
            return Ok(vec![]);
        }

        self.enter_voting(&guessers)
    }

    fn enter_voting(&mut self, guessers: &[String]) -> Commanded {
        let mut table: Vec<CardId> = Vec::new();
        if let Some(clue_card) = &self.round.clue_card {
            table.push(clue_card.clone());
        }
        for guesser in guessers {
            if let Some(cards) = self.round.nominations.get(guesser) {
                table.extend(cards.clone());
            }
        }
        table.shuffle(&mut rand::rng());
        self.round.table = table.clone();

        for guesser in guessers {
            let own = self
                .round
                .nominations
                .get(guesser)
                .cloned()
                .map(|v| v.into_iter().collect::<HashSet<_>>())
                .unwrap_or_default();
            self.round.disabled.insert(guesser.clone(), own);
        }
        self.stage = Stage::Voting;

        let description = self.round.clue.clone().unwrap_or_default();
        let votes_per_guesser = self.config.votes_per_guesser;
        let mut out = vec![self.broadcast_snapshot()];
        for guesser in guessers {
            let disabled_cards: Vec<CardId> = self.round.disabled.get(guesser).cloned().unwrap_or_default().into_iter().collect();
            out.push(Outgoing::to(
                guesser.clone(),
                ServerMessage::BeginVoting {
                    center_cards: table.clone(),
                    description: description.clone(),
                    disabled_cards,
                    votes_per_guesser,
                },
            ));
        }
        Ok(out)
    }

    pub fn submit_votes(&mut self, name: &str, cards: &[CardId]) -> Commanded {
        if !self.stage.accepts_votes() {
            return Err(EngineError::StageForbidsAction);
        }
        if self.round.storyteller.as_deref() == Some(name) {
            return Err(EngineError::PermissionDenied);
        }
        if self.round.votes.contains_key(name) {
            return Err(EngineError::StageForbidsAction);
        }
        if cards.len() != self.config.votes_per_guesser as usize {
            return Err(EngineError::WrongVoteCount);
        }
        let disabled = self.round.disabled.get(name).cloned().unwrap_or_default();
        for card in cards {
            if !self.round.table.contains(card) {
                return Err(EngineError::UnknownCardId);
            }
            if disabled.contains(card) {
                return Err(EngineError::VoteOnOwnCard);
            }
        }
        self.round.votes.insert(name.to_string(), cards.to_vec());

        let guessers = self.active_guessers();
        if !self.round.voters_remaining(&guessers).is_empty() {
            return Ok(vec![]);
        }

        self.finish_round(&guessers)
    }

    fn finish_round(&mut self, guessers: &[String]) -> Commanded {
        let storyteller = self.round.storyteller.clone().ok_or_else(|| {
            EngineError::InternalInvariant("finish_round with no storyteller".into())
        })?;
        let clue_card = self.round.clue_card.clone().ok_or_else(|| {
            EngineError::InternalInvariant("finish_round with no clue card".into())
        })?;

        let votes: Vec<GuesserVotes> = guessers
            .iter()
            .map(|name| GuesserVotes { name, tokens: self.round.votes.get(name).map(|v| v.as_slice()).unwrap_or(&[]) })
            .collect();
        let nominations: Vec<GuesserNomination> = guessers
            .iter()
            .map(|name| GuesserNomination { name, cards: self.round.nominations.get(name).map(|v| v.as_slice()).unwrap_or(&[]) })
            .collect();

        let outcome = scoring::score_round(&self.config, &storyteller, &clue_card, &votes, &nominations);

        for (name, delta) in &outcome.deltas {
            if let Some(m) = self.member_mut(name) {
                m.points = (m.points + delta).max(0);
            }
        }

        let mut table_and_clue = self.round.table.clone();
        table_and_clue.push(clue_card.clone());
        self.deck.discard(table_and_clue);
        self.round_number += 1;

        if self.game_has_been_won() {
            self.stage = Stage::End;
            let winner = self.leader();
            return Ok(vec![self.broadcast_snapshot(), Outgoing::broadcast(ServerMessage::EndGame { winner })]);
        }

        self.stage = Stage::Results;
        let player_to_current_cards: HashMap<String, Vec<CardId>> = guessers
            .iter()
            .map(|n| (n.clone(), self.round.nominations.get(n).cloned().unwrap_or_default()))
            .collect();
        let player_to_votes: HashMap<String, Vec<CardId>> =
            guessers.iter().map(|n| (n.clone(), self.round.votes.get(n).cloned().unwrap_or_default())).collect();

        Ok(vec![
            self.broadcast_snapshot(),
            Outgoing::broadcast(ServerMessage::Results {
                player_to_current_cards,
                player_to_votes,
                active_card: clue_card,
                point_change: outcome.deltas,
            }),
        ])
    }

    fn game_has_been_won(&self) -> bool {
        match self.config.win_condition {
            WinCondition::Points { target } => self.members.iter().any(|m| m.points as u32 >= target),
            WinCondition::Cycles { target } => {
                let live_active_count = self.active_player_count() as u32;
                live_active_count > 0 && self.round_number >= target * live_active_count
            }
            WinCondition::CardsFinish => false,
        }
    }

    fn leader(&self) -> Option<String> {
        self.members.iter().max_by_key(|m| m.points).map(|m| m.name.clone())
    }

    /// Abandons the round currently in flight, if any, returning
    /// unplayed/nominated cards back to their owners' hands rather than
    /// the discard pile, then parks the room. Pausing out of `Results`
    /// has no cards to reclaim — `finish_round` already moved them to the
    /// discard pile — so it just clears the stale round bookkeeping.
    fn enter_pause(&mut self, reason: String) -> Vec<Outgoing> {
        if self.stage.is_round_in_flight() {
            self.abandon_round_in_progress();
        } else {
            self.round = RoundState::default();
        }
        self.stage = Stage::Paused { reason };
        vec![self.broadcast_snapshot()]
    }

    fn cancel_round_for_departed_storyteller(&mut self) -> Commanded {
        self.abandon_round_in_progress();
        self.start_round()
    }

    fn abandon_round_in_progress(&mut self) {
        if let Some(clue_card) = self.round.clue_card.take() {
            if let Some(storyteller) = &self.round.storyteller {
                self.hands.entry(storyteller.clone()).or_default().push(clue_card);
            }
        }
        for (name, cards) in self.round.nominations.drain() {
            self.hands.entry(name).or_default().extend(cards);
        }
        self.round = RoundState::default();
    }

    // ---- snapshot ----------------------------------------------------

    pub fn snapshot(&self) -> ServerMessage {
        let members = self
            .members
            .iter()
            .map(|m| MemberView {
                name: m.name.clone(),
                kind: m.kind,
                status: m.status,
                points: m.points,
                ready: m.ready,
                is_moderator: self.moderators.contains(&m.name),
            })
            .collect();
        ServerMessage::RoomState {
            room_id: self.room_id.clone(),
            creator: self.creator.clone(),
            members,
            stage: stage_label(&self.stage),
            round_number: self.round_number,
            active_player: self.round.storyteller.clone(),
            deck_refill_count: self.deck.refill_count,
            config: RoomConfigView::from(&self.config),
        }
    }

    fn broadcast_snapshot(&self) -> Outgoing {
        Outgoing::broadcast(self.snapshot())
    }

    #[cfg(test)]
    pub fn hand_of(&self, name: &str) -> Vec<CardId> {
        self.hands.get(name).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn points_of(&self, name: &str) -> i64 {
        self.member(name).map(|m| m.points).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_in_play(&self, card: &str) -> bool {
        self.deck.is_in_play(card)
    }
}

fn stage_label(stage: &Stage) -> String {
    match stage {
        Stage::Joining => "joining".to_string(),
        Stage::ActiveChooses => "active_chooses".to_string(),
        Stage::PlayersChoose => "players_choose".to_string(),
        Stage::Voting => "voting".to_string(),
        Stage::Results => "results".to_string(),
        Stage::Paused { reason } => format!("paused: {reason}"),
        Stage::End => "end".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(n: usize) -> Arc<Vec<CardId>> {
        Arc::new((0..n).map(|i| format!("card{i}")).collect())
    }

    fn join_all(engine: &mut Engine, names: &[&str]) {
        for &name in names {
            engine.join(name, &format!("tok-{name}"), None).unwrap();
        }
    }

    #[test]
    fn scenario_basic_round_reaches_results() {
        let mut engine = Engine::new("abcd".into(), Some("alice".into()), RoomConfig::new(WinCondition::Points { target: 100 }, None), registry(30));
        join_all(&mut engine, &["alice", "bob", "carol", "dan"]);
        engine.start_game("alice").unwrap();
        assert!(matches!(engine.stage, Stage::ActiveChooses));

        let storyteller = engine.round.storyteller.clone().unwrap();
        let clue_card = engine.hand_of(&storyteller)[0].clone();
        engine.active_player_choose_card(&storyteller, &clue_card, "moon").unwrap();
        assert!(matches!(engine.stage, Stage::PlayersChoose));

        let guessers: Vec<String> = engine.active_guessers();
        assert_eq!(guessers.len(), 3);
        for g in &guessers {
            let card = engine.hand_of(g)[0].clone();
            engine.player_choose_cards(g, &[card]).unwrap();
        }
        assert!(matches!(engine.stage, Stage::Voting));
        assert_eq!(engine.round.table.len(), 4);

        for g in &guessers {
            let vote = engine.round.table[0].clone();
            let _ = engine.submit_votes(g, &[vote]);
        }
        assert!(matches!(engine.stage, Stage::Results) || matches!(engine.stage, Stage::End));
    }

    #[test]
    fn cannot_start_game_below_three_players() {
        let mut engine = Engine::new("abcd".into(), Some("alice".into()), RoomConfig::new(WinCondition::Points { target: 10 }, None), registry(30));
        join_all(&mut engine, &["alice", "bob"]);
        assert_eq!(engine.start_game("alice").unwrap_err(), EngineError::NotEnoughPlayers);
    }

    #[test]
    fn refill_increments_once_when_pile_runs_short() {
        let mut engine = Engine::new("abcd".into(), Some("a".into()), RoomConfig::new(WinCondition::Points { target: 1000 }, None), registry(20));
        join_all(&mut engine, &["a", "b", "c"]);
        engine.start_game("a").unwrap();
        assert_eq!(engine.deck.refill_count, 0);

        // Run one full round to push cards into discard, shrinking the pile.
        let storyteller = engine.round.storyteller.clone().unwrap();
        let clue = engine.hand_of(&storyteller)[0].clone();
        engine.active_player_choose_card(&storyteller, &clue, "clue").unwrap();
        let guessers = engine.active_guessers();
        for g in &guessers {
            let card = engine.hand_of(g)[0].clone();
            engine.player_choose_cards(g, &[card]).unwrap();
        }
        let table = engine.round.table.clone();
        for g in &guessers {
            engine.submit_votes(g, &[table[0].clone()]).unwrap();
        }
        // 3 active players * 6 cards = 18 dealt out of 20; one clue + two
        // nominations leave the draw pile too thin to refill everyone to 6
        // without pulling from the now-larger discard pool.
        assert!(matches!(engine.stage, Stage::Results));
        for &name in &["a", "b", "c"] {
            assert!(engine.hand_of(name).len() <= 6);
        }
    }

    #[test]
    fn midgame_observer_promotes_on_next_round() {
        let mut engine = Engine::new("abcd".into(), Some("a".into()), RoomConfig::new(WinCondition::Points { target: 1000 }, None), registry(40));
        join_all(&mut engine, &["a", "b", "c"]);
        engine.start_game("a").unwrap();

        engine.join("d", "tok-d", None).unwrap();
        assert_eq!(engine.member("d").unwrap().kind, MemberKind::Observer);

        // Finish the round so a new ActiveChooses starts and promotion fires.
        let storyteller = engine.round.storyteller.clone().unwrap();
        let clue = engine.hand_of(&storyteller)[0].clone();
        engine.active_player_choose_card(&storyteller, &clue, "clue").unwrap();
        let guessers = engine.active_guessers();
        for g in &guessers {
            let card = engine.hand_of(g)[0].clone();
            engine.player_choose_cards(g, &[card]).unwrap();
        }
        let table = engine.round.table.clone();
        for g in &guessers {
            engine.submit_votes(g, &[table[0].clone()]).unwrap();
        }
        if matches!(engine.stage, Stage::Results) {
            for &name in &["a", "b", "c"] {
                engine.ready(name).unwrap();
            }
        }
        assert_eq!(engine.member("d").unwrap().kind, MemberKind::Active);
    }

    #[test]
    fn reconnect_restores_membership_without_duplicate() {
        let mut engine = Engine::new("abcd".into(), Some("a".into()), RoomConfig::new(WinCondition::Points { target: 10 }, None), registry(10));
        join_all(&mut engine, &["a", "b", "c"]);
        engine.disconnect("b").unwrap();
        assert_eq!(engine.member("b").unwrap().status, ConnStatus::Disconnected);

        engine.join("b", "tok-b", None).unwrap();
        assert_eq!(engine.member("b").unwrap().status, ConnStatus::Connected);
        assert_eq!(engine.members.iter().filter(|m| m.name == "b").count(), 1);
    }

    #[test]
    fn storyteller_departure_rotates_and_restarts_round() {
        let mut engine = Engine::new("abcd".into(), Some("a".into()), RoomConfig::new(WinCondition::Points { target: 1000 }, None), registry(40));
        join_all(&mut engine, &["a", "b", "c", "d"]);
        engine.start_game("a").unwrap();
        let storyteller = engine.round.storyteller.clone().unwrap();
        engine.leave(&storyteller).unwrap();
        assert!(matches!(engine.stage, Stage::ActiveChooses));
        assert_ne!(engine.round.storyteller.as_deref(), Some(storyteller.as_str()));
    }

    #[test]
    fn storyteller_leaving_during_results_does_not_resurrect_discarded_cards() {
        let mut engine = Engine::new("abcd".into(), Some("alice".into()), RoomConfig::new(WinCondition::Points { target: 1000 }, None), registry(40));
        join_all(&mut engine, &["alice", "bob", "carol", "dan"]);
        engine.start_game("alice").unwrap();

        let storyteller = engine.round.storyteller.clone().unwrap();
        let clue_card = engine.hand_of(&storyteller)[0].clone();
        engine.active_player_choose_card(&storyteller, &clue_card, "clue").unwrap();
        let guessers = engine.active_guessers();
        let mut nominated = Vec::new();
        for g in &guessers {
            let card = engine.hand_of(g)[0].clone();
            engine.player_choose_cards(g, &[card.clone()]).unwrap();
            nominated.push(card);
        }
        // Vote for the clue card itself: it's nobody's own nomination, so
        // this never trips the "can't vote for your own card" rejection
        // regardless of shuffle order.
        for g in &guessers {
            engine.submit_votes(g, &[clue_card.clone()]).unwrap();
        }
        assert!(matches!(engine.stage, Stage::Results));
        assert!(!engine.is_in_play(&clue_card));

        // The storyteller leaves with quorum (3) still intact; the round's
        // cards are already discarded and must not come back.
        engine.leave(&storyteller).unwrap();
        assert!(engine.hand_of(&storyteller).is_empty());
        assert!(!engine.is_in_play(&clue_card));
        for card in &nominated {
            assert!(!engine.is_in_play(card));
            for &name in &["bob", "carol", "dan"] {
                assert!(!engine.hand_of(name).contains(card));
            }
        }
    }

    #[test]
    fn dropping_below_three_active_pauses_the_room() {
        let mut engine = Engine::new("abcd".into(), Some("a".into()), RoomConfig::new(WinCondition::Points { target: 1000 }, None), registry(40));
        join_all(&mut engine, &["a", "b", "c"]);
        engine.start_game("a").unwrap();
        engine.leave("c").unwrap();
        assert!(matches!(engine.stage, Stage::Paused { .. }));
    }
}
