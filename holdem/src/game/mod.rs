//! Poker engine: cards, evaluation, pots, the authoritative table state
//! machine and the sanitizing view serializer.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cards;
pub mod errors;
pub mod eval;
pub mod pot;
pub mod table;
pub mod view;

/// Whole chips. Signed so that settlement deltas (ending minus starting
/// stack) and the persisted ledger share one representation.
pub type Chips = i64;

/// Position index around the table, `0..MAX_SEATS`.
pub type SeatIndex = usize;

/// Table identifier assigned by the registry.
pub type TableId = i64;

/// Seats per table. Two to six players play; the deck never runs short.
pub const MAX_SEATS: usize = 6;

/// Stable player identifier returned by the identity provider (a SteamID64
/// rendered as a string). Structural equality, hashable, cheap to clone.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
