//! Table actor command and response types.

use crate::game::errors::TableError;
use crate::game::table::{Blinds, Phase, PlayerAction};
use crate::game::{Chips, PlayerId, SeatIndex, TableId};
use serde::Serialize;
use tokio::sync::oneshot;

/// Commands consumed by a table's run loop, in enqueue order. Client
/// messages, registry requests and timer fires all arrive here; nothing
/// else touches the god state.
#[derive(Debug)]
pub enum TableCommand {
    /// A session (re)joined the table channel: replay a fresh snapshot.
    Connect {
        player: PlayerId,
        respond: oneshot::Sender<()>,
    },

    /// Seat at a specific index with a buy-in.
    Sit {
        player: PlayerId,
        display_name: String,
        seat_index: SeatIndex,
        buy_in: Chips,
        respond: oneshot::Sender<Result<(), TableError>>,
    },

    /// Mark ready for the next hand.
    Ready {
        player: PlayerId,
        respond: oneshot::Sender<Result<(), TableError>>,
    },

    /// A betting action.
    Action {
        player: PlayerId,
        action: PlayerAction,
        respond: oneshot::Sender<Result<(), TableError>>,
    },

    /// Unseat and leave the channel. Returns the chips walking away with
    /// the player (zero when the seat frees at hand end).
    Leave {
        player: PlayerId,
        respond: oneshot::Sender<Result<Chips, TableError>>,
    },

    /// Public summary for the directory listing.
    Summary {
        respond: oneshot::Sender<TableSummary>,
    },

    /// Unseat everyone and stop the loop.
    Shutdown { respond: oneshot::Sender<()> },
}

/// Public table summary exposed by the directory.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub id: TableId,
    pub name: String,
    pub phase: Phase,
    pub seats_filled: usize,
    pub max_seats: usize,
    pub blinds: Blinds,
}
