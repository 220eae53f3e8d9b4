//! The chip ledger: durable balances and append-only hand histories.
//!
//! Settlement happens once per hand as a single unit of work: one
//! `adjust_many` with every non-zero stack delta, then one `save_hand`.
//! Failure of either is fatal for the hand: the table holds and does not
//! advance the button until the write lands.

mod memory;
mod models;
mod pg;

pub use memory::MemoryLedger;
pub use models::UserAccount;
pub use pg::PgLedger;

use crate::game::table::HandRecord;
use crate::game::{Chips, PlayerId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient chips for {player}: balance {balance}, change {delta}")]
    InsufficientChips {
        player: PlayerId,
        balance: Chips,
        delta: Chips,
    },
    #[error("account {0} not found")]
    NotFound(PlayerId),
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("hand record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// The persistence boundary. [`PgLedger`] backs production; tests and
/// mock mode run on [`MemoryLedger`] against the same contract.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Return the account, creating it with the configured starting
    /// balance when absent. An existing account picks up a changed
    /// display name.
    async fn find_or_create(
        &self,
        id: &PlayerId,
        display_name: &str,
    ) -> Result<UserAccount, LedgerError>;

    /// Current balance, or `None` for an unknown account.
    async fn balance(&self, id: &PlayerId) -> Result<Option<Chips>, LedgerError>;

    /// Apply one signed delta under a row lock. Fails with
    /// [`LedgerError::InsufficientChips`] when the result would be
    /// negative; returns the new balance.
    async fn adjust(&self, id: &PlayerId, delta: Chips) -> Result<Chips, LedgerError>;

    /// Apply a map of deltas in one transaction. Rows lock in sorted
    /// identifier order (the map is ordered) to avoid deadlocks between
    /// concurrent settlements; all deltas validate before any applies.
    async fn adjust_many(&self, deltas: &BTreeMap<PlayerId, Chips>) -> Result<(), LedgerError>;

    /// Append a hand-history row; returns the assigned id.
    async fn save_hand(&self, record: &HandRecord) -> Result<i64, LedgerError>;
}
