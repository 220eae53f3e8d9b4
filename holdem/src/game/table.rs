//! The authoritative per-table state machine.
//!
//! One [`TableState`] is the god view of a table: deck, hole cards, pots,
//! phase and timers. It is a reducer (commands in, events out) and is
//! only ever mutated from its owning actor loop, so no locking happens
//! here. Timers are modelled as generation-stamped pending entries that the
//! actor arms and fires back into the machine; a stale generation is
//! ignored, which makes cancellation transactional with the transition
//! that caused it.

use super::cards::{Card, Deck};
use super::errors::TableError;
use super::eval::evaluate_seven;
use super::pot::{Pot, PotManager};
use super::{Chips, PlayerId, SeatIndex, TableId, MAX_SEATS};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Hand lifecycle phases. Cyclic; there is no terminal phase.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Phase {
    Lobby,
    Waiting,
    Starting,
    Dealing,
    PreFlop,
    Flop,
    Turn,
    River,
    ShowdownReveal,
    PayoutAnimation,
    SocialBanter,
}

impl Phase {
    /// A street with live betting.
    pub fn is_betting(&self) -> bool {
        matches!(self, Self::PreFlop | Self::Flop | Self::Turn | Self::River)
    }

    /// Hole cards may be revealed to everyone.
    pub fn is_showdown(&self) -> bool {
        matches!(self, Self::ShowdownReveal | Self::PayoutAnimation | Self::SocialBanter)
    }

    /// Seating is allowed between hands only.
    pub fn allows_seating(&self) -> bool {
        matches!(self, Self::Lobby | Self::Waiting | Self::SocialBanter)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small, self.big)
    }
}

/// Per-table rules: blinds, seat count and timer durations. All timer
/// defaults mirror the server configuration defaults.
#[derive(Clone, Debug)]
pub struct TableRules {
    pub blinds: Blinds,
    pub max_seats: usize,
    pub countdown: Duration,
    pub turn_timeout: Duration,
    pub payout_animation: Duration,
    pub banter: Duration,
}

impl Default for TableRules {
    fn default() -> Self {
        Self {
            blinds: Blinds { small: 10, big: 20 },
            max_seats: MAX_SEATS,
            countdown: Duration::from_secs(3),
            turn_timeout: Duration::from_secs(30),
            payout_animation: Duration::from_secs(5),
            banter: Duration::from_secs(15),
        }
    }
}

/// A betting action as requested by a client. `Raise` carries the total
/// new bet to match, not the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Raise(Chips),
    AllIn,
}

/// An action as it actually resolved, recorded into the hand history and
/// broadcast as `PLAYER_ACTION`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecordedAction {
    PostSmallBlind { amount: Chips },
    PostBigBlind { amount: Chips },
    Fold,
    TimeoutFold,
    Check,
    Call { amount: Chips },
    Raise { to: Chips },
    AllIn { amount: Chips },
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionRecord {
    pub street: Phase,
    pub action: RecordedAction,
}

/// One player's binding to a seat. Hole cards live here and leave only
/// through the serializer.
#[derive(Clone, Debug)]
pub struct SeatState {
    pub player: PlayerId,
    pub display_name: String,
    pub stack: Chips,
    pub hole_cards: Option<[Card; 2]>,
    pub round_wager: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub acted_this_round: bool,
    pub ready: bool,
    pub leaving: bool,
    pub starting_stack: Chips,
    pub actions: Vec<ActionRecord>,
}

impl SeatState {
    fn new(player: PlayerId, display_name: String, stack: Chips) -> Self {
        Self {
            player,
            display_name,
            stack,
            hole_cards: None,
            round_wager: 0,
            folded: false,
            all_in: false,
            acted_this_round: false,
            ready: false,
            leaving: false,
            starting_stack: stack,
            actions: Vec::new(),
        }
    }

    /// Dealt into the current hand and not folded.
    pub fn still_in(&self) -> bool {
        self.hole_cards.is_some() && !self.folded
    }

    /// Still in and able to act.
    pub fn can_act(&self) -> bool {
        self.still_in() && !self.all_in
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerKind {
    Countdown,
    TurnTimer,
    PayoutAnimation,
    Banter,
}

/// A timer the actor must arm. The generation stamp cancels stale fires:
/// any transition that should cancel a timer simply bumps the generation.
#[derive(Clone, Copy, Debug)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub duration: Duration,
    pub generation: u64,
}

/// Winner line of the `HAND_RESULT` broadcast and hand history.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSummary {
    #[serde(rename = "steamId")]
    pub player: PlayerId,
    pub cards: Vec<Card>,
    pub hand_rank: Option<String>,
    pub amount: Chips,
}

/// One seat's slice of a hand history record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandSeatRecord {
    pub seat: SeatIndex,
    pub player: PlayerId,
    pub display_name: String,
    pub starting_stack: Chips,
    pub ending_stack: Chips,
    pub actions: Vec<ActionRecord>,
    /// Final hole cards, absent for folded players.
    pub hole_cards: Option<[Card; 2]>,
    pub hand_rank: Option<String>,
}

/// Append-only hand history record, persisted as one JSON document.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandRecord {
    pub table_id: TableId,
    pub hand_no: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub community: Vec<Card>,
    pub seats: Vec<HandSeatRecord>,
    pub pots: Vec<Pot>,
    pub winners: Vec<WinnerSummary>,
    pub pot_total: Chips,
}

/// Everything the ledger needs at hand end, as one unit of work: zero-sum
/// balance deltas (ending minus starting stack) plus the history record.
#[derive(Clone, Debug, PartialEq)]
pub struct HandOutcome {
    pub deltas: BTreeMap<PlayerId, Chips>,
    pub record: HandRecord,
}

/// Events the reducer hands back to the actor for fan-out or persistence.
#[derive(Clone, Debug, PartialEq)]
pub enum TableEvent {
    ActionTaken {
        player: PlayerId,
        action: RecordedAction,
        new_pot: Chips,
    },
    HandResult {
        winners: Vec<WinnerSummary>,
        pots: Vec<Pot>,
    },
    HandComplete(HandOutcome),
}

/// The complete authoritative state of one table.
pub struct TableState {
    pub table_id: TableId,
    pub rules: TableRules,
    phase: Phase,
    sequence: u64,
    deck: Deck,
    community: Vec<Card>,
    pot: PotManager,
    current_bet: Chips,
    min_raise: Chips,
    dealer_seat: SeatIndex,
    acting_seat: Option<SeatIndex>,
    seats: Vec<Option<SeatState>>,
    hand_no: u64,
    hand_started_at: Option<DateTime<Utc>>,
    timer: Option<PendingTimer>,
    timer_generation: u64,
    settled: bool,
}

impl TableState {
    /// The deck is injected so tests can pass a seeded one; production
    /// tables take entropy-seeded decks.
    pub fn new(table_id: TableId, rules: TableRules, deck: Deck) -> Self {
        let max_seats = rules.max_seats.min(MAX_SEATS);
        Self {
            table_id,
            rules: TableRules { max_seats, ..rules },
            phase: Phase::Lobby,
            sequence: 0,
            deck,
            community: Vec::with_capacity(5),
            pot: PotManager::new(),
            current_bet: 0,
            min_raise: 0,
            dealer_seat: 0,
            acting_seat: None,
            seats: vec![None; max_seats],
            hand_no: 0,
            hand_started_at: None,
            timer: None,
            timer_generation: 0,
            settled: true,
        }
    }

    // ------------------------------------------------------------------
    // Read access (the serializer and actor use these; nothing mutable
    // escapes).

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn community(&self) -> &[Card] {
        &self.community
    }

    pub fn pot_total(&self) -> Chips {
        self.pot.total()
    }

    pub fn current_bet(&self) -> Chips {
        self.current_bet
    }

    pub fn min_raise(&self) -> Chips {
        self.min_raise
    }

    pub fn dealer_seat(&self) -> SeatIndex {
        self.dealer_seat
    }

    pub fn acting_seat(&self) -> Option<SeatIndex> {
        self.acting_seat
    }

    pub fn seats(&self) -> &[Option<SeatState>] {
        &self.seats
    }

    pub fn pending_timer(&self) -> Option<PendingTimer> {
        self.timer
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<SeatIndex> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|b| &b.player == player))
    }

    pub fn stack_of(&self, player: &PlayerId) -> Option<Chips> {
        let idx = self.seat_of(player)?;
        self.seats[idx].as_ref().map(|b| b.stack)
    }

    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    fn touch(&mut self) {
        self.sequence += 1;
    }

    // ------------------------------------------------------------------
    // Timers

    fn arm(&mut self, kind: TimerKind, duration: Duration) {
        self.timer_generation += 1;
        self.timer = Some(PendingTimer {
            kind,
            duration,
            generation: self.timer_generation,
        });
    }

    fn disarm(&mut self) {
        self.timer_generation += 1;
        self.timer = None;
    }

    // ------------------------------------------------------------------
    // Seating and readiness

    /// Bind a player to a seat with the given buy-in. Allowed only between
    /// hands (Lobby, Waiting, SocialBanter).
    pub fn seat(
        &mut self,
        player: PlayerId,
        display_name: String,
        seat_idx: SeatIndex,
        buy_in: Chips,
    ) -> Result<(), TableError> {
        if !self.phase.allows_seating() {
            return Err(TableError::InvalidAction(
                "cannot sit while a hand is in progress".into(),
            ));
        }
        if seat_idx >= self.seats.len() {
            return Err(TableError::InvalidAction(format!(
                "seat index {seat_idx} out of range"
            )));
        }
        if buy_in <= 0 {
            return Err(TableError::InsufficientChips);
        }
        if self.seat_of(&player).is_some() {
            return Err(TableError::AlreadySeated);
        }
        if self.seats.iter().all(|s| s.is_some()) {
            return Err(TableError::TableFull);
        }
        if self.seats[seat_idx].is_some() {
            return Err(TableError::SeatTaken);
        }

        self.seats[seat_idx] = Some(SeatState::new(player, display_name, buy_in));
        if self.phase == Phase::Lobby {
            self.phase = Phase::Waiting;
        }
        self.touch();
        Ok(())
    }

    /// Remove a player. Mid-hand this is an immediate fold and the seat
    /// frees at hand end; otherwise the seat empties now. Returns the
    /// chips leaving the table with the player, when they leave at once.
    pub fn unseat(&mut self, player: &PlayerId) -> Result<(Chips, Vec<TableEvent>), TableError> {
        let idx = self.seat_of(player).ok_or(TableError::NotSeated)?;
        let dealt_in = self.seats[idx]
            .as_ref()
            .is_some_and(|b| b.hole_cards.is_some());

        if self.phase.is_betting() && dealt_in {
            // Deferred removal keeps the binding around so the hand's
            // settlement still records this player's losses.
            let binding = self.seats[idx].as_mut().expect("seat checked above");
            binding.leaving = true;
            binding.ready = false;
            let events = if binding.folded {
                Vec::new()
            } else {
                self.fold_seat(idx, RecordedAction::Fold)
            };
            self.touch();
            return Ok((0, events));
        }

        // Between streets the hand is not live for this seat; pull the
        // binding out entirely.
        let binding = self.seats[idx].take().expect("seat checked above");
        if self.acting_seat == Some(idx) {
            self.acting_seat = None;
        }
        self.touch();
        Ok((binding.stack, Vec::new()))
    }

    /// Mark a seated player ready. Calling twice has no additional effect.
    pub fn ready(&mut self, player: &PlayerId) -> Result<(), TableError> {
        let idx = self.seat_of(player).ok_or(TableError::NotSeated)?;
        let binding = self.seats[idx].as_mut().expect("seat checked above");
        if binding.ready {
            return Ok(());
        }
        binding.ready = true;
        self.touch();
        self.maybe_start();
        Ok(())
    }

    /// Waiting -> Starting when at least two chip-positive players are
    /// seated and every chip-positive binding is ready.
    fn maybe_start(&mut self) {
        if self.phase != Phase::Waiting || !self.settled {
            return;
        }
        let funded: Vec<&SeatState> = self
            .seats
            .iter()
            .flatten()
            .filter(|b| b.stack > 0)
            .collect();
        if funded.len() >= 2 && funded.iter().all(|b| b.ready) {
            self.phase = Phase::Starting;
            self.arm(TimerKind::Countdown, self.rules.countdown);
            self.touch();
        }
    }

    // ------------------------------------------------------------------
    // Hand start

    /// Participants of the next hand: seated, funded, not leaving.
    fn participants(&self) -> Vec<SeatIndex> {
        (0..self.seats.len())
            .filter(|&i| {
                self.seats[i]
                    .as_ref()
                    .is_some_and(|b| b.stack > 0 && !b.leaving)
            })
            .collect()
    }

    fn next_seat_where<F>(&self, from: SeatIndex, pred: F) -> Option<SeatIndex>
    where
        F: Fn(&SeatState) -> bool,
    {
        let n = self.seats.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&idx| self.seats[idx].as_ref().is_some_and(&pred))
    }

    /// Deal hole cards, post blinds, open preflop. Runs when the Starting
    /// countdown fires.
    fn begin_hand(&mut self) -> Result<Vec<TableEvent>, TableError> {
        let participants = self.participants();
        if participants.len() < 2 {
            // A player left during the countdown; fall back to Waiting.
            self.phase = Phase::Waiting;
            self.disarm();
            self.touch();
            return Ok(Vec::new());
        }

        self.phase = Phase::Dealing;
        self.hand_no += 1;
        self.hand_started_at = Some(Utc::now());
        self.community.clear();
        self.pot.reset();
        self.deck.reset();
        self.settled = false;

        // The button must rest on a funded seat.
        if !participants.contains(&self.dealer_seat) {
            self.dealer_seat = self
                .next_seat_where(self.dealer_seat, |b| b.stack > 0 && !b.leaving)
                .expect("at least two funded seats");
        }

        for &idx in &participants {
            let cards = self
                .deck
                .deal(2)
                .map_err(|e| TableError::Internal(e.to_string()))?;
            let binding = self.seats[idx].as_mut().expect("participant seat");
            binding.hole_cards = Some([cards[0], cards[1]]);
            binding.folded = false;
            binding.all_in = false;
            binding.round_wager = 0;
            binding.acted_this_round = false;
            binding.starting_stack = binding.stack;
            binding.actions.clear();
        }

        // Heads-up the dealer is the small blind; otherwise the blinds sit
        // clockwise of the button.
        let (sb_seat, bb_seat) = if participants.len() == 2 {
            let other = self
                .next_seat_where(self.dealer_seat, SeatState::still_in)
                .expect("heads-up opponent");
            (self.dealer_seat, other)
        } else {
            let sb = self
                .next_seat_where(self.dealer_seat, SeatState::still_in)
                .expect("small blind seat");
            let bb = self
                .next_seat_where(sb, SeatState::still_in)
                .expect("big blind seat");
            (sb, bb)
        };

        let small = self.rules.blinds.small;
        let big = self.rules.blinds.big;
        self.post_blind(sb_seat, small, false);
        self.post_blind(bb_seat, big, true);
        self.current_bet = big;
        self.min_raise = big;

        self.phase = Phase::PreFlop;
        // First to act preflop: clockwise of the big blind.
        self.acting_seat = self.next_seat_where(bb_seat, SeatState::can_act);
        self.touch();

        match self.acting_seat {
            Some(_) => {
                self.arm(TimerKind::TurnTimer, self.rules.turn_timeout);
                Ok(Vec::new())
            }
            // Blinds put everyone all-in: no action, run the board out.
            None => Ok(self.close_betting_round()),
        }
    }

    /// Blinds are forced wagers: short stacks post what they have and are
    /// all-in.
    fn post_blind(&mut self, seat_idx: SeatIndex, blind: Chips, big: bool) {
        let binding = self.seats[seat_idx].as_mut().expect("blind seat");
        let amount = blind.min(binding.stack);
        binding.stack -= amount;
        binding.round_wager += amount;
        if binding.stack == 0 {
            binding.all_in = true;
        }
        let action = if big {
            RecordedAction::PostBigBlind { amount }
        } else {
            RecordedAction::PostSmallBlind { amount }
        };
        binding.actions.push(ActionRecord {
            street: Phase::Dealing,
            action,
        });
        let player = binding.player.clone();
        self.pot.add(&player, amount);
    }

    // ------------------------------------------------------------------
    // Actions

    /// Validate and apply a betting action from `player`. Violations leave
    /// the state untouched and surface only to the offender.
    pub fn act(
        &mut self,
        player: &PlayerId,
        action: PlayerAction,
    ) -> Result<Vec<TableEvent>, TableError> {
        if !self.phase.is_betting() {
            return Err(TableError::InvalidAction(format!(
                "no betting during {}",
                self.phase
            )));
        }
        let seat_idx = self.seat_of(player).ok_or(TableError::NotSeated)?;
        if self.acting_seat != Some(seat_idx) {
            return Err(TableError::NotYourTurn);
        }
        let binding = self.seats[seat_idx].as_ref().expect("acting seat");
        if !binding.can_act() {
            return Err(TableError::InvalidAction("no action available".into()));
        }

        let recorded = self.validate_and_apply(seat_idx, action)?;
        self.touch();

        let mut events = vec![TableEvent::ActionTaken {
            player: player.clone(),
            action: recorded.clone(),
            new_pot: self.pot.total(),
        }];
        events.extend(self.after_action(seat_idx));
        Ok(events)
    }

    /// The per-action validation matrix. Returns what actually happened.
    fn validate_and_apply(
        &mut self,
        seat_idx: SeatIndex,
        action: PlayerAction,
    ) -> Result<RecordedAction, TableError> {
        let current_bet = self.current_bet;
        let min_raise = self.min_raise;
        let street = self.phase;
        let binding = self.seats[seat_idx].as_mut().expect("acting seat");

        let recorded = match action {
            PlayerAction::Fold => {
                binding.folded = true;
                RecordedAction::Fold
            }
            PlayerAction::Check => {
                if binding.round_wager != current_bet {
                    return Err(TableError::InvalidAction(format!(
                        "cannot check facing a bet of {current_bet}"
                    )));
                }
                binding.acted_this_round = true;
                RecordedAction::Check
            }
            PlayerAction::Call => {
                if current_bet <= binding.round_wager {
                    return Err(TableError::InvalidAction("nothing to call".into()));
                }
                let delta = current_bet - binding.round_wager;
                let paid = delta.min(binding.stack);
                binding.stack -= paid;
                binding.round_wager += paid;
                if binding.stack == 0 {
                    binding.all_in = true;
                }
                binding.acted_this_round = true;
                let player = binding.player.clone();
                self.pot.add(&player, paid);
                RecordedAction::Call { amount: paid }
            }
            PlayerAction::Raise(total) => {
                if total <= current_bet {
                    return Err(TableError::InvalidAction(format!(
                        "raise total {total} must exceed the current bet {current_bet}"
                    )));
                }
                if total - current_bet < min_raise {
                    return Err(TableError::InvalidAction(format!(
                        "raise must increase the bet by at least {min_raise}"
                    )));
                }
                if total - binding.round_wager > binding.stack {
                    return Err(TableError::InsufficientChips);
                }
                let paid = total - binding.round_wager;
                binding.stack -= paid;
                binding.round_wager = total;
                if binding.stack == 0 {
                    binding.all_in = true;
                }
                binding.acted_this_round = true;
                let player = binding.player.clone();
                self.pot.add(&player, paid);
                self.min_raise = total - current_bet;
                self.current_bet = total;
                self.reopen_action(seat_idx);
                RecordedAction::Raise { to: total }
            }
            PlayerAction::AllIn => {
                if binding.stack <= 0 {
                    return Err(TableError::InvalidAction("no chips behind".into()));
                }
                let paid = binding.stack;
                binding.stack = 0;
                binding.round_wager += paid;
                binding.all_in = true;
                binding.acted_this_round = true;
                let wager = binding.round_wager;
                let player = binding.player.clone();
                self.pot.add(&player, paid);
                if wager > current_bet {
                    if wager - current_bet >= min_raise {
                        // A full raise reopens the action.
                        self.min_raise = wager - current_bet;
                        self.current_bet = wager;
                        self.reopen_action(seat_idx);
                    } else {
                        // Under-raise: the bet to match grows, but players
                        // who already acted are not reopened.
                        self.current_bet = wager;
                    }
                }
                RecordedAction::AllIn { amount: paid }
            }
        };

        let binding = self.seats[seat_idx].as_mut().expect("acting seat");
        binding.actions.push(ActionRecord {
            street,
            action: recorded.clone(),
        });
        Ok(recorded)
    }

    /// A raise puts everyone else back on the clock this round.
    fn reopen_action(&mut self, raiser: SeatIndex) {
        for (idx, seat) in self.seats.iter_mut().enumerate() {
            if idx == raiser {
                continue;
            }
            if let Some(binding) = seat {
                if binding.can_act() {
                    binding.acted_this_round = false;
                }
            }
        }
    }

    /// Fold a seat outside the normal action flow (timeout, disconnect).
    fn fold_seat(&mut self, seat_idx: SeatIndex, action: RecordedAction) -> Vec<TableEvent> {
        let street = self.phase;
        let binding = self.seats[seat_idx].as_mut().expect("folding seat");
        binding.folded = true;
        binding.actions.push(ActionRecord {
            street,
            action: action.clone(),
        });
        let player = binding.player.clone();

        let mut events = vec![TableEvent::ActionTaken {
            player,
            action,
            new_pot: self.pot.total(),
        }];
        if self.acting_seat == Some(seat_idx) {
            events.extend(self.after_action(seat_idx));
        } else {
            events.extend(self.check_hand_over());
        }
        events
    }

    /// After a seat has acted: hand over, round closed, or pass the turn.
    fn after_action(&mut self, acted_seat: SeatIndex) -> Vec<TableEvent> {
        let over = self.check_hand_over();
        if !over.is_empty() {
            return over;
        }
        if self.round_closed() {
            return self.close_betting_round();
        }
        self.acting_seat = self.next_seat_where(acted_seat, |b| {
            b.can_act() && (!b.acted_this_round || b.round_wager < self.current_bet)
        });
        match self.acting_seat {
            Some(_) => {
                self.arm(TimerKind::TurnTimer, self.rules.turn_timeout);
                Vec::new()
            }
            // Nobody left to act but the round did not read as closed:
            // treat as closed rather than stalling the table.
            None => self.close_betting_round(),
        }
    }

    /// Short-circuit: all but one folded, at any moment of the hand.
    fn check_hand_over(&mut self) -> Vec<TableEvent> {
        if !self.phase.is_betting() {
            return Vec::new();
        }
        let still_in: Vec<SeatIndex> = (0..self.seats.len())
            .filter(|&i| self.seats[i].as_ref().is_some_and(SeatState::still_in))
            .collect();
        if still_in.len() == 1 {
            return self.award_uncontested(still_in[0]);
        }
        Vec::new()
    }

    /// Betting-round closure per the three-rule predicate.
    fn round_closed(&self) -> bool {
        let still_in: Vec<&SeatState> = self
            .seats
            .iter()
            .flatten()
            .filter(|b| b.still_in())
            .collect();
        if still_in.len() <= 1 {
            return true;
        }
        let live: Vec<&&SeatState> = still_in.iter().filter(|b| !b.all_in).collect();
        if live.is_empty() {
            return true;
        }
        // A lone live player with the wagers already matched has no one
        // left to bet against.
        if live.len() == 1 && live[0].round_wager >= self.current_bet && live[0].acted_this_round {
            return true;
        }
        live.iter()
            .all(|b| b.acted_this_round && b.round_wager == self.current_bet)
    }

    /// Advance past a closed betting round: next street, or showdown.
    fn close_betting_round(&mut self) -> Vec<TableEvent> {
        loop {
            let next = match self.phase {
                Phase::PreFlop => Phase::Flop,
                Phase::Flop => Phase::Turn,
                Phase::Turn => Phase::River,
                Phase::River => {
                    return self.showdown();
                }
                other => {
                    warn!("close_betting_round in {other}");
                    return Vec::new();
                }
            };
            if let Err(e) = self.deal_street(next) {
                // Deck exhaustion with six seats is impossible; treat as a
                // fault and freeze the hand for teardown.
                warn!("table {}: {e}", self.table_id);
                return Vec::new();
            }

            // Fresh round bookkeeping.
            self.current_bet = 0;
            self.min_raise = self.rules.blinds.big;
            for seat in self.seats.iter_mut().flatten() {
                seat.round_wager = 0;
                seat.acted_this_round = false;
            }
            self.phase = next;
            self.touch();

            let live: Vec<SeatIndex> = (0..self.seats.len())
                .filter(|&i| self.seats[i].as_ref().is_some_and(SeatState::can_act))
                .collect();
            if live.len() <= 1 {
                // No meaningful betting possible; run the board out.
                if self.phase == Phase::River {
                    return self.showdown();
                }
                continue;
            }

            // First to act post-flop: first still-in seat clockwise of the
            // dealer.
            self.acting_seat = self.next_seat_where(self.dealer_seat, SeatState::can_act);
            debug_assert!(self.acting_seat.is_some());
            self.arm(TimerKind::TurnTimer, self.rules.turn_timeout);
            return Vec::new();
        }
    }

    fn deal_street(&mut self, street: Phase) -> Result<(), TableError> {
        let count = match street {
            Phase::Flop => 3,
            Phase::Turn | Phase::River => 1,
            _ => return Ok(()),
        };
        self.deck
            .burn()
            .map_err(|e| TableError::Internal(e.to_string()))?;
        let cards = self
            .deck
            .deal(count)
            .map_err(|e| TableError::Internal(e.to_string()))?;
        self.community.extend(cards);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hand end

    /// Everyone folded to one player: the whole pool is theirs, no
    /// evaluation, cards stay mucked.
    fn award_uncontested(&mut self, winner_seat: SeatIndex) -> Vec<TableEvent> {
        let total = self.pot.total();
        let binding = self.seats[winner_seat].as_mut().expect("winner seat");
        binding.stack += total;
        let winner = WinnerSummary {
            player: binding.player.clone(),
            cards: Vec::new(),
            hand_rank: None,
            amount: total,
        };
        let pots = vec![Pot {
            amount: total,
            eligible: vec![winner.player.clone()],
        }];
        self.finish_hand(vec![winner], pots)
    }

    /// Evaluate every still-in hand, partition the pool, distribute, and
    /// move chips into stacks.
    fn showdown(&mut self) -> Vec<TableEvent> {
        self.phase = Phase::ShowdownReveal;
        self.touch();

        debug_assert_eq!(self.community.len(), 5, "showdown needs a full board");

        let mut scores: HashMap<PlayerId, u32> = HashMap::new();
        let mut ranks: HashMap<PlayerId, (String, Vec<Card>)> = HashMap::new();
        let mut still_in: Vec<PlayerId> = Vec::new();
        for binding in self.seats.iter().flatten() {
            if !binding.still_in() {
                continue;
            }
            let hole = binding.hole_cards.expect("still-in seat has cards");
            let mut seven = hole.to_vec();
            seven.extend_from_slice(&self.community);
            let rank = evaluate_seven(&seven);
            scores.insert(binding.player.clone(), rank.score);
            ranks.insert(
                binding.player.clone(),
                (rank.category.label().to_string(), hole.to_vec()),
            );
            still_in.push(binding.player.clone());
        }

        let pots = self.pot.pots(&still_in);
        let odd_chip_order = self.clockwise_of_dealer();
        let payouts = PotManager::distribute(&pots, &scores, &odd_chip_order);

        let mut winners = Vec::new();
        for (player, amount) in &payouts {
            if let Some(idx) = self.seat_of(player) {
                self.seats[idx].as_mut().expect("payout seat").stack += amount;
            }
            let (label, cards) = ranks.get(player).cloned().unwrap_or_default();
            winners.push(WinnerSummary {
                player: player.clone(),
                cards,
                hand_rank: Some(label),
                amount: *amount,
            });
        }
        self.finish_hand(winners, pots)
    }

    /// Still-in players in seat order starting clockwise of the dealer;
    /// the deterministic odd-chip order.
    fn clockwise_of_dealer(&self) -> Vec<PlayerId> {
        let n = self.seats.len();
        (1..=n)
            .map(|step| (self.dealer_seat + step) % n)
            .filter_map(|idx| self.seats[idx].as_ref())
            .filter(|b| b.still_in())
            .map(|b| b.player.clone())
            .collect()
    }

    /// Build the settlement payload, enter PayoutAnimation.
    fn finish_hand(&mut self, winners: Vec<WinnerSummary>, pots: Vec<Pot>) -> Vec<TableEvent> {
        self.phase = Phase::PayoutAnimation;
        self.acting_seat = None;

        let mut deltas: BTreeMap<PlayerId, Chips> = BTreeMap::new();
        let mut seat_records = Vec::new();
        for (idx, binding) in self.seats.iter().enumerate() {
            let Some(binding) = binding else { continue };
            if binding.hole_cards.is_none() {
                continue; // not dealt into this hand
            }
            let delta = binding.stack - binding.starting_stack;
            if delta != 0 {
                deltas.insert(binding.player.clone(), delta);
            }
            seat_records.push(HandSeatRecord {
                seat: idx,
                player: binding.player.clone(),
                display_name: binding.display_name.clone(),
                starting_stack: binding.starting_stack,
                ending_stack: binding.stack,
                actions: binding.actions.clone(),
                hole_cards: if binding.folded { None } else { binding.hole_cards },
                hand_rank: winners
                    .iter()
                    .find(|w| w.player == binding.player)
                    .and_then(|w| w.hand_rank.clone()),
            });
        }
        debug_assert_eq!(deltas.values().sum::<Chips>(), 0, "hands are zero-sum");

        let record = HandRecord {
            table_id: self.table_id,
            hand_no: self.hand_no,
            started_at: self.hand_started_at.unwrap_or_else(Utc::now),
            ended_at: Utc::now(),
            community: self.community.clone(),
            seats: seat_records,
            pots: pots.clone(),
            winners: winners.clone(),
            pot_total: self.pot.total(),
        };

        self.arm(TimerKind::PayoutAnimation, self.rules.payout_animation);
        self.touch();
        vec![
            TableEvent::HandResult { winners, pots },
            TableEvent::HandComplete(HandOutcome { deltas, record }),
        ]
    }

    /// The actor confirms the ledger committed this hand.
    pub fn mark_settled(&mut self) {
        self.settled = true;
    }

    /// A viewer joined or reconnected: advance the counter so the snapshot
    /// replayed to them strictly supersedes anything delivered before.
    pub fn bump_for_snapshot(&mut self) {
        self.touch();
    }

    /// Sweep between hands: leaving seats empty out, per-hand state
    /// resets, the button advances one funded seat clockwise.
    fn end_banter(&mut self) {
        for seat in &mut self.seats {
            if seat.as_ref().is_some_and(|b| b.leaving) {
                *seat = None;
                continue;
            }
            if let Some(binding) = seat {
                binding.hole_cards = None;
                binding.folded = false;
                binding.all_in = false;
                binding.round_wager = 0;
                binding.acted_this_round = false;
                binding.actions.clear();
            }
        }
        self.community.clear();
        self.pot.reset();
        self.current_bet = 0;
        self.min_raise = 0;
        self.acting_seat = None;
        if let Some(next) = self.next_seat_where(self.dealer_seat, |b| b.stack > 0) {
            self.dealer_seat = next;
        }
        self.phase = Phase::Waiting;
        self.disarm();
        self.touch();
        self.maybe_start();
    }

    // ------------------------------------------------------------------
    // Timer dispatch

    /// Fire a timer previously armed by this machine. Stale generations
    /// are ignored; the transition that obsoleted the timer already ran.
    pub fn timer_fired(&mut self, kind: TimerKind, generation: u64) -> Vec<TableEvent> {
        let Some(pending) = self.timer else {
            return Vec::new();
        };
        if pending.generation != generation || pending.kind != kind {
            return Vec::new();
        }
        self.timer = None;

        match kind {
            TimerKind::Countdown => {
                if self.phase != Phase::Starting {
                    return Vec::new();
                }
                match self.begin_hand() {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("table {}: failed to start hand: {e}", self.table_id);
                        Vec::new()
                    }
                }
            }
            TimerKind::TurnTimer => {
                let Some(seat_idx) = self.acting_seat else {
                    return Vec::new();
                };
                debug!(
                    "table {}: seat {seat_idx} timed out, auto-folding",
                    self.table_id
                );
                self.touch();
                self.fold_seat(seat_idx, RecordedAction::TimeoutFold)
            }
            TimerKind::PayoutAnimation => {
                if self.phase == Phase::PayoutAnimation {
                    self.phase = Phase::SocialBanter;
                    self.arm(TimerKind::Banter, self.rules.banter);
                    self.touch();
                }
                Vec::new()
            }
            TimerKind::Banter => {
                if self.phase != Phase::SocialBanter {
                    return Vec::new();
                }
                if !self.settled {
                    // Ledger has not committed this hand; hold the table
                    // here rather than advance the button.
                    warn!(
                        "table {}: hand {} unsettled, holding in banter",
                        self.table_id, self.hand_no
                    );
                    self.arm(TimerKind::Banter, self.rules.banter);
                    return Vec::new();
                }
                self.end_banter();
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::Deck;

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn table_with(players: &[(&str, Chips)]) -> TableState {
        let mut table = TableState::new(1, TableRules::default(), Deck::seeded(42));
        for (i, (name, stack)) in players.iter().enumerate() {
            table
                .seat(pid(name), name.to_string(), i, *stack)
                .unwrap();
        }
        for (name, _) in players {
            table.ready(&pid(name)).unwrap();
        }
        table
    }

    /// Drive Starting -> PreFlop through the countdown timer.
    fn start_hand(table: &mut TableState) {
        assert_eq!(table.phase(), Phase::Starting);
        let timer = table.pending_timer().unwrap();
        assert_eq!(timer.kind, TimerKind::Countdown);
        table.timer_fired(TimerKind::Countdown, timer.generation);
        assert_eq!(table.phase(), Phase::PreFlop);
    }

    fn chip_sum(table: &TableState) -> Chips {
        table
            .seats()
            .iter()
            .flatten()
            .map(|b| b.stack)
            .sum::<Chips>()
            + table.pot_total()
    }

    #[test]
    fn test_first_seat_moves_lobby_to_waiting() {
        let mut table = TableState::new(1, TableRules::default(), Deck::seeded(1));
        assert_eq!(table.phase(), Phase::Lobby);
        table.seat(pid("a"), "a".into(), 0, 1000).unwrap();
        assert_eq!(table.phase(), Phase::Waiting);
    }

    #[test]
    fn test_seat_occupied_and_full() {
        let mut table = TableState::new(1, TableRules::default(), Deck::seeded(1));
        for i in 0..MAX_SEATS {
            table
                .seat(pid(&format!("p{i}")), format!("p{i}"), i, 1000)
                .unwrap();
        }
        assert_eq!(
            table.seat(pid("late"), "late".into(), 0, 1000),
            Err(TableError::TableFull)
        );
        let mut partial = TableState::new(2, TableRules::default(), Deck::seeded(1));
        partial.seat(pid("a"), "a".into(), 0, 1000).unwrap();
        assert_eq!(
            partial.seat(pid("b"), "b".into(), 0, 1000),
            Err(TableError::SeatTaken)
        );
        assert_eq!(
            partial.seat(pid("a"), "a".into(), 1, 1000),
            Err(TableError::AlreadySeated)
        );
    }

    #[test]
    fn test_ready_twice_is_idempotent() {
        let mut table = TableState::new(1, TableRules::default(), Deck::seeded(1));
        table.seat(pid("a"), "a".into(), 0, 1000).unwrap();
        table.ready(&pid("a")).unwrap();
        let seq = table.sequence();
        table.ready(&pid("a")).unwrap();
        assert_eq!(table.sequence(), seq, "second ready must be a no-op");
    }

    #[test]
    fn test_all_ready_arms_countdown_then_deals() {
        let mut table = table_with(&[("a", 1000), ("b", 1000)]);
        start_hand(&mut table);
        let dealt: usize = table
            .seats()
            .iter()
            .flatten()
            .filter(|b| b.hole_cards.is_some())
            .count();
        assert_eq!(dealt, 2);
        assert_eq!(table.pot_total(), 30); // blinds posted
    }

    #[test]
    fn test_heads_up_dealer_posts_small_blind_and_acts_first() {
        let mut table = table_with(&[("a", 1000), ("b", 1000)]);
        start_hand(&mut table);
        let dealer = table.dealer_seat();
        let dealer_binding = table.seats()[dealer].as_ref().unwrap();
        assert_eq!(dealer_binding.round_wager, 10, "dealer is the small blind");
        assert_eq!(table.acting_seat(), Some(dealer), "dealer acts first preflop");
    }

    #[test]
    fn test_three_handed_blind_order_and_first_actor() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        let d = table.dealer_seat();
        let sb = (d + 1) % MAX_SEATS;
        let bb = (d + 2) % MAX_SEATS;
        assert_eq!(table.seats()[sb].as_ref().unwrap().round_wager, 10);
        assert_eq!(table.seats()[bb].as_ref().unwrap().round_wager, 20);
        assert_eq!(table.acting_seat(), Some(d), "UTG is clockwise of the BB");
    }

    #[test]
    fn test_check_facing_bet_rejected_without_mutation() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        let seq = table.sequence();
        let err = table.act(&pid("a"), PlayerAction::Check).unwrap_err();
        assert!(matches!(err, TableError::InvalidAction(_)));
        assert_eq!(table.sequence(), seq, "rejected action must not mutate");
    }

    #[test]
    fn test_out_of_turn_action_rejected() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        // Seat b is the small blind; it is a's turn.
        assert_eq!(
            table.act(&pid("b"), PlayerAction::Call),
            Err(TableError::NotYourTurn)
        );
    }

    #[test]
    fn test_minimum_raise_boundary() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        // Current bet 20, min increment 20: raising to 39 is short, 40 legal.
        let err = table.act(&pid("a"), PlayerAction::Raise(39)).unwrap_err();
        assert!(matches!(err, TableError::InvalidAction(_)));
        table.act(&pid("a"), PlayerAction::Raise(40)).unwrap();
        assert_eq!(table.current_bet(), 40);
        assert_eq!(table.min_raise(), 20);
    }

    #[test]
    fn test_raise_reopens_action() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        table.act(&pid("a"), PlayerAction::Raise(60)).unwrap();
        table.act(&pid("b"), PlayerAction::Call).unwrap();
        // c re-raises; a and b must act again.
        table.act(&pid("c"), PlayerAction::Raise(200)).unwrap();
        let a = table.seats()[0].as_ref().unwrap();
        let b = table.seats()[1].as_ref().unwrap();
        assert!(!a.acted_this_round);
        assert!(!b.acted_this_round);
        assert_eq!(table.min_raise(), 140);
    }

    #[test]
    fn test_call_short_stack_goes_all_in() {
        let mut table = table_with(&[("a", 1000), ("b", 50), ("c", 1000)]);
        start_hand(&mut table);
        table.act(&pid("a"), PlayerAction::Raise(300)).unwrap();
        table.act(&pid("b"), PlayerAction::Call).unwrap();
        let b = table.seats()[1].as_ref().unwrap();
        assert!(b.all_in);
        assert_eq!(b.stack, 0);
        assert_eq!(b.round_wager, 50);
    }

    #[test]
    fn test_all_in_below_call_is_a_call_for_less() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 70)]);
        start_hand(&mut table);
        table.act(&pid("a"), PlayerAction::Raise(300)).unwrap();
        table.act(&pid("b"), PlayerAction::Call).unwrap();
        table.act(&pid("c"), PlayerAction::AllIn).unwrap();
        // 70 total against a 300 bet: the bet to match does not move and
        // nobody is reopened; the round closes.
        assert_eq!(table.current_bet(), 300);
        assert_eq!(table.phase(), Phase::Flop);
    }

    #[test]
    fn test_under_raise_all_in_does_not_reopen() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 70)]);
        start_hand(&mut table);
        // a raises to 60; c shoves 70 total, a 10-chip under-raise.
        table.act(&pid("a"), PlayerAction::Raise(60)).unwrap();
        table.act(&pid("b"), PlayerAction::Call).unwrap();
        table.act(&pid("c"), PlayerAction::AllIn).unwrap();
        assert_eq!(table.current_bet(), 70);
        // a already acted; the short shove must not reopen raising rights,
        // only the 10 more to call.
        let a = table.seats()[0].as_ref().unwrap();
        assert!(a.acted_this_round);
        table.act(&pid("a"), PlayerAction::Call).unwrap();
        table.act(&pid("b"), PlayerAction::Call).unwrap();
        assert_eq!(table.phase(), Phase::Flop);
    }

    #[test]
    fn test_fold_to_one_short_circuits_to_payout() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        table.act(&pid("a"), PlayerAction::Fold).unwrap();
        let events = table.act(&pid("b"), PlayerAction::Fold).unwrap();
        assert_eq!(table.phase(), Phase::PayoutAnimation);
        assert!(events
            .iter()
            .any(|e| matches!(e, TableEvent::HandComplete(_))));
        // Big blind wins the blinds uncontested.
        let bb_seat = (table.dealer_seat() + 2) % MAX_SEATS;
        let c = table.seats()[bb_seat].as_ref().unwrap();
        assert_eq!(c.stack, 1010);
        assert_eq!(chip_sum(&table), 3000 + table.pot_total());
    }

    #[test]
    fn test_turn_timer_auto_folds() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        let timer = table.pending_timer().unwrap();
        assert_eq!(timer.kind, TimerKind::TurnTimer);
        table.timer_fired(TimerKind::TurnTimer, timer.generation);
        let a = table.seats()[0].as_ref().unwrap();
        assert!(a.folded, "acting player folds on timeout");
        assert_eq!(table.acting_seat(), Some(1));
    }

    #[test]
    fn test_stale_timer_generation_is_ignored() {
        let mut table = table_with(&[("a", 1000), ("b", 1000), ("c", 1000)]);
        start_hand(&mut table);
        let stale = table.pending_timer().unwrap();
        table.act(&pid("a"), PlayerAction::Call).unwrap();
        let events = table.timer_fired(TimerKind::TurnTimer, stale.generation);
        assert!(events.is_empty());
        let b = table.seats()[1].as_ref().unwrap();
        assert!(!b.folded, "stale timeout must not fold the next actor");
    }

    #[test]
    fn test_full_hand_with_raise_call_fold() {
        // Scenario: P1 dealer, P2 SB, P3 BB, blinds 10/20.
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        assert_eq!(table.dealer_seat(), 0);

        table.act(&pid("p1"), PlayerAction::Raise(100)).unwrap();
        table.act(&pid("p2"), PlayerAction::Call).unwrap();
        table.act(&pid("p3"), PlayerAction::Fold).unwrap();
        assert!(table.pot_total() >= 210);
        assert_eq!(table.phase(), Phase::Flop);

        // First to act post-flop is P2, clockwise of the dealer.
        assert_eq!(table.acting_seat(), Some(1));
        table.act(&pid("p2"), PlayerAction::Check).unwrap();
        table.act(&pid("p1"), PlayerAction::Check).unwrap();
        assert_eq!(table.phase(), Phase::Turn);

        table.act(&pid("p2"), PlayerAction::Raise(200)).unwrap();
        table.act(&pid("p1"), PlayerAction::Call).unwrap();
        assert!(table.pot_total() >= 610);
        assert_eq!(table.phase(), Phase::River);

        table.act(&pid("p2"), PlayerAction::Check).unwrap();
        table.act(&pid("p1"), PlayerAction::Check).unwrap();
        assert_eq!(table.phase(), Phase::PayoutAnimation);
        assert_eq!(chip_sum(&table), 3000 + table.pot_total());
        let stacks: Chips = table.seats().iter().flatten().map(|b| b.stack).sum();
        assert_eq!(stacks, 3000, "payout conserves chips");
    }

    #[test]
    fn test_three_way_all_in_builds_side_pots() {
        // Scenario: stacks 100/200/300 all commit preflop.
        let mut table = table_with(&[("p1", 100), ("p2", 200), ("p3", 300)]);
        start_hand(&mut table);
        table.act(&pid("p1"), PlayerAction::AllIn).unwrap();
        table.act(&pid("p2"), PlayerAction::AllIn).unwrap();
        let events = table.act(&pid("p3"), PlayerAction::AllIn).unwrap();
        // Board runs out, hand settles immediately.
        assert_eq!(table.phase(), Phase::PayoutAnimation);
        let result = events
            .iter()
            .find_map(|e| match e {
                TableEvent::HandResult { pots, .. } => Some(pots.clone()),
                _ => None,
            })
            .expect("hand result emitted");
        assert_eq!(result[0].amount, 300);
        assert_eq!(result[0].eligible.len(), 3);
        assert_eq!(result[1].amount, 200);
        assert_eq!(result[1].eligible.len(), 2);
        assert_eq!(result[2].amount, 100);
        assert_eq!(result[2].eligible, vec![pid("p3")]);
        let stacks: Chips = table.seats().iter().flatten().map(|b| b.stack).sum();
        assert_eq!(stacks, 600, "all-in settlement conserves chips");
    }

    #[test]
    fn test_check_down_to_showdown_has_one_result() {
        // Scenario: three players call 20 preflop and check every street.
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        table.act(&pid("p1"), PlayerAction::Call).unwrap();
        table.act(&pid("p2"), PlayerAction::Call).unwrap();
        table.act(&pid("p3"), PlayerAction::Check).unwrap();
        assert_eq!(table.pot_total(), 60);
        for _ in 0..3 {
            table.act(&pid("p2"), PlayerAction::Check).unwrap();
            table.act(&pid("p3"), PlayerAction::Check).unwrap();
            table.act(&pid("p1"), PlayerAction::Check).unwrap();
        }
        assert_eq!(table.phase(), Phase::PayoutAnimation);
        let stacks: Chips = table.seats().iter().flatten().map(|b| b.stack).sum();
        assert_eq!(stacks, 3000);
    }

    #[test]
    fn test_round_closure_invariant_holds_after_each_action() {
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        let actions = [
            (pid("p1"), PlayerAction::Raise(60)),
            (pid("p2"), PlayerAction::Call),
            (pid("p3"), PlayerAction::Call),
        ];
        for (player, action) in actions {
            table.act(&player, action).unwrap();
            // Conservation after every accepted action.
            assert_eq!(chip_sum(&table), 3000);
        }
        assert_eq!(table.phase(), Phase::Flop);
        // Round closed: everyone still in and not all-in matched the bet.
        for binding in table.seats().iter().flatten() {
            assert_eq!(binding.round_wager, 0, "round wagers reset per street");
        }
    }

    #[test]
    fn test_unseat_mid_hand_folds_and_frees_seat_at_hand_end() {
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        let (chips, _) = table.unseat(&pid("p3")).unwrap();
        assert_eq!(chips, 0, "seat is freed at hand end, not now");
        let p3 = table.seats()[2].as_ref().unwrap();
        assert!(p3.folded && p3.leaving);

        table.act(&pid("p1"), PlayerAction::Call).unwrap();
        table.act(&pid("p2"), PlayerAction::Call).unwrap();
        for _ in 0..3 {
            table.act(&pid("p2"), PlayerAction::Check).unwrap();
            table.act(&pid("p1"), PlayerAction::Check).unwrap();
        }
        assert_eq!(table.phase(), Phase::PayoutAnimation);
        table.mark_settled();
        let payout = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::PayoutAnimation, payout.generation);
        assert_eq!(table.phase(), Phase::SocialBanter);
        let banter = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::Banter, banter.generation);
        assert_eq!(table.phase(), Phase::Waiting);
        assert!(table.seats()[2].is_none(), "leaving seat freed at hand end");
    }

    #[test]
    fn test_button_advances_after_banter() {
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        let dealer_before = table.dealer_seat();
        table.act(&pid("p1"), PlayerAction::Fold).unwrap();
        table.act(&pid("p2"), PlayerAction::Fold).unwrap();
        table.mark_settled();
        let payout = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::PayoutAnimation, payout.generation);
        let banter = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::Banter, banter.generation);
        assert_eq!(table.dealer_seat(), (dealer_before + 1) % MAX_SEATS);
        // Everyone stayed ready, so the next hand is already counting down.
        assert_eq!(table.phase(), Phase::Starting);
    }

    #[test]
    fn test_unsettled_hand_holds_in_banter() {
        let mut table = table_with(&[("p1", 1000), ("p2", 1000), ("p3", 1000)]);
        start_hand(&mut table);
        let dealer_before = table.dealer_seat();
        table.act(&pid("p1"), PlayerAction::Fold).unwrap();
        table.act(&pid("p2"), PlayerAction::Fold).unwrap();
        // No mark_settled: the ledger write is still outstanding.
        let payout = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::PayoutAnimation, payout.generation);
        let banter = table.pending_timer().unwrap();
        table.timer_fired(TimerKind::Banter, banter.generation);
        assert_eq!(table.phase(), Phase::SocialBanter, "table holds unsettled");
        assert_eq!(table.dealer_seat(), dealer_before, "button does not move");
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let mut table = table_with(&[("p1", 1000), ("p2", 1000)]);
        let mut last = table.sequence();
        start_hand(&mut table);
        assert!(table.sequence() > last);
        last = table.sequence();
        table.act(&pid("p1"), PlayerAction::Call).unwrap();
        assert!(table.sequence() > last);
    }
}
