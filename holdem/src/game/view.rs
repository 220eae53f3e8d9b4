//! Sanitized per-viewer projections of the god state.
//!
//! The snapshot types are the only shapes that ever leave a table. They
//! have no deck field at all, so the undealt deck cannot leak under any
//! condition; opponents' hole cards are an explicit [`HoleCardsView::Hidden`]
//! marker outside showdown.

use super::cards::Card;
use super::table::{Blinds, Phase, TableState};
use super::{Chips, PlayerId, SeatIndex, TableId};
use serde::{Deserialize, Serialize};

/// A player's hole-card slot as one viewer sees it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "cards")]
pub enum HoleCardsView {
    /// No cards dealt (between hands or just seated).
    Empty,
    /// Cards exist but this viewer may not see them.
    Hidden,
    Shown([Card; 2]),
}

/// Public seat fields plus the viewer-dependent hole-card slot.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    #[serde(rename = "steamId")]
    pub player: PlayerId,
    pub display_name: String,
    pub seat: SeatIndex,
    pub stack: Chips,
    pub round_wager: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub ready: bool,
    pub hole_cards: HoleCardsView,
}

/// A full sanitized view for one recipient; the `GAME_SNAPSHOT` payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub table_id: TableId,
    #[serde(rename = "sequenceId")]
    pub sequence: u64,
    pub phase: Phase,
    pub community: Vec<Card>,
    pub pot_total: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub dealer_seat: SeatIndex,
    pub acting_seat: Option<SeatIndex>,
    pub blinds: Blinds,
    pub players: Vec<PlayerView>,
}

/// An incremental delta between two snapshots for the same recipient; the
/// `STATE_PATCH` payload. Only changed fields are present; the sequence
/// counter always is, and is strictly greater than the last delivered one.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePatch {
    #[serde(rename = "sequenceId")]
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community: Option<Vec<Card>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_total: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_bet: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_raise: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_seat: Option<SeatIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_seat: Option<Option<SeatIndex>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<PlayerView>>,
}

/// Project the god state into `viewer`'s personal view. At showdown the
/// non-folded hole cards are open to everyone; otherwise only the
/// viewer's own slot is filled.
pub fn snapshot_for(state: &TableState, viewer: &PlayerId) -> TableSnapshot {
    let showdown = state.phase().is_showdown();
    let players = state
        .seats()
        .iter()
        .enumerate()
        .filter_map(|(seat, binding)| binding.as_ref().map(|b| (seat, b)))
        .map(|(seat, b)| {
            let hole_cards = match b.hole_cards {
                None => HoleCardsView::Empty,
                Some(cards) if &b.player == viewer => HoleCardsView::Shown(cards),
                Some(cards) if showdown && !b.folded => HoleCardsView::Shown(cards),
                Some(_) => HoleCardsView::Hidden,
            };
            PlayerView {
                player: b.player.clone(),
                display_name: b.display_name.clone(),
                seat,
                stack: b.stack,
                round_wager: b.round_wager,
                folded: b.folded,
                all_in: b.all_in,
                ready: b.ready,
                hole_cards,
            }
        })
        .collect();

    TableSnapshot {
        table_id: state.table_id,
        sequence: state.sequence(),
        phase: state.phase(),
        community: state.community().to_vec(),
        pot_total: state.pot_total(),
        current_bet: state.current_bet(),
        min_raise: state.min_raise(),
        dealer_seat: state.dealer_seat(),
        acting_seat: state.acting_seat(),
        blinds: state.rules.blinds.clone(),
        players,
    }
}

/// The delta from `old` to `new` for one recipient. Includes a changed
/// player list wholesale; a player's hole-card slot changing (a deal, a
/// reveal) changes the list and therefore ships.
pub fn diff(old: &TableSnapshot, new: &TableSnapshot) -> TablePatch {
    fn changed<T: Clone + PartialEq>(old: &T, new: &T) -> Option<T> {
        (old != new).then(|| new.clone())
    }

    TablePatch {
        sequence: new.sequence,
        phase: changed(&old.phase, &new.phase),
        community: changed(&old.community, &new.community),
        pot_total: changed(&old.pot_total, &new.pot_total),
        current_bet: changed(&old.current_bet, &new.current_bet),
        min_raise: changed(&old.min_raise, &new.min_raise),
        dealer_seat: changed(&old.dealer_seat, &new.dealer_seat),
        acting_seat: changed(&old.acting_seat, &new.acting_seat),
        players: changed(&old.players, &new.players),
    }
}

impl TablePatch {
    /// Replay this patch onto a snapshot. Clients reconstruct state this
    /// way; tests prove `apply(old, diff(old, new)) == new`.
    pub fn apply_to(&self, snapshot: &mut TableSnapshot) {
        snapshot.sequence = self.sequence;
        if let Some(phase) = self.phase {
            snapshot.phase = phase;
        }
        if let Some(community) = &self.community {
            snapshot.community = community.clone();
        }
        if let Some(pot_total) = self.pot_total {
            snapshot.pot_total = pot_total;
        }
        if let Some(current_bet) = self.current_bet {
            snapshot.current_bet = current_bet;
        }
        if let Some(min_raise) = self.min_raise {
            snapshot.min_raise = min_raise;
        }
        if let Some(dealer_seat) = self.dealer_seat {
            snapshot.dealer_seat = dealer_seat;
        }
        if let Some(acting_seat) = self.acting_seat {
            snapshot.acting_seat = acting_seat;
        }
        if let Some(players) = &self.players {
            snapshot.players = players.clone();
        }
    }

    /// A patch that changes nothing beyond the counter.
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.community.is_none()
            && self.pot_total.is_none()
            && self.current_bet.is_none()
            && self.min_raise.is_none()
            && self.dealer_seat.is_none()
            && self.acting_seat.is_none()
            && self.players.is_none()
    }
}

/// Leak check used by tests and debug assertions: outside showdown, a view
/// for `viewer` must hide every other live player's hole cards.
pub fn validate(view: &TableSnapshot, viewer: &PlayerId) -> bool {
    if view.phase.is_showdown() {
        return true;
    }
    view.players.iter().all(|p| {
        &p.player == viewer
            || matches!(p.hole_cards, HoleCardsView::Empty | HoleCardsView::Hidden)
    })
}
