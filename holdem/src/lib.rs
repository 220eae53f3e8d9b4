//! # Holdem
//!
//! An authoritative real-time Texas Hold'em server core. Clients are
//! untrusted; this crate is the single source of truth for shuffling, hand
//! progression and chip movement.
//!
//! ## Architecture
//!
//! Every table is serviced by one actor task consuming an ordered command
//! inbox, so a table's god state is only ever mutated from its own loop.
//! The hand lifecycle runs through eleven phases:
//!
//! - **Lobby/Waiting**: seating and readiness
//! - **Starting**: countdown before the deal
//! - **Dealing**: hole cards and blinds
//! - **PreFlop/Flop/Turn/River**: betting streets
//! - **ShowdownReveal**: evaluation and pot distribution
//! - **PayoutAnimation/SocialBanter**: timed cosmetic phases, then back to
//!   Waiting with the button advanced
//!
//! Outbound state never leaves a table except through the sanitizing
//! serializer in [`game::view`], which structurally cannot leak the deck or
//! an opponent's hole cards.
//!
//! ## Core modules
//!
//! - [`game`]: cards, hand evaluation, pots, the table state machine and
//!   the view serializer
//! - [`table`]: the per-table actor, its message types and the registry
//! - [`session`]: identity-bound sessions with reconnect grace
//! - [`ledger`]: transactional chip balances and hand histories
//! - [`net`]: the wire protocol
//! - [`social`]: the high-frequency chat/emote fan-out, outside the state
//!   machine by design

pub mod game;
pub mod ledger;
pub mod net;
pub mod session;
pub mod social;
pub mod table;

pub use game::{
    cards::{Card, Deck, Suit, Value},
    errors::{ErrorCode, TableError},
    eval::{evaluate_seven, HandCategory, HandRank},
    pot::{Pot, PotManager},
    table::{Blinds, Phase, PlayerAction, TableState},
    view::{HoleCardsView, TablePatch, TableSnapshot},
    Chips, PlayerId, SeatIndex, TableId, MAX_SEATS,
};
