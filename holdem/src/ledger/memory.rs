//! In-memory ledger for tests and mock mode.
//!
//! Same contract as the Postgres implementation: adjustments validate
//! before they apply, and `adjust_many` is all-or-nothing.

use super::{Ledger, LedgerError, UserAccount};
use crate::game::table::HandRecord;
use crate::game::{Chips, PlayerId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    accounts: HashMap<PlayerId, UserAccount>,
    hands: Vec<HandRecord>,
}

pub struct MemoryLedger {
    inner: Mutex<Inner>,
    starting_balance: Chips,
}

impl MemoryLedger {
    pub fn new(starting_balance: Chips) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            starting_balance,
        }
    }

    /// Number of persisted hand records.
    pub async fn hand_count(&self) -> usize {
        self.inner.lock().await.hands.len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn find_or_create(
        &self,
        id: &PlayerId,
        display_name: &str,
    ) -> Result<UserAccount, LedgerError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let account = inner
            .accounts
            .entry(id.clone())
            .or_insert_with(|| UserAccount {
                id: id.clone(),
                display_name: display_name.to_string(),
                chips: self.starting_balance,
                created_at: now,
                updated_at: now,
            });
        if account.display_name != display_name {
            account.display_name = display_name.to_string();
            account.updated_at = now;
        }
        Ok(account.clone())
    }

    async fn balance(&self, id: &PlayerId) -> Result<Option<Chips>, LedgerError> {
        Ok(self.inner.lock().await.accounts.get(id).map(|a| a.chips))
    }

    async fn adjust(&self, id: &PlayerId, delta: Chips) -> Result<Chips, LedgerError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        let updated = account.chips + delta;
        if updated < 0 {
            return Err(LedgerError::InsufficientChips {
                player: id.clone(),
                balance: account.chips,
                delta,
            });
        }
        account.chips = updated;
        account.updated_at = Utc::now();
        Ok(updated)
    }

    async fn adjust_many(&self, deltas: &BTreeMap<PlayerId, Chips>) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        // Validate everything before touching anything.
        for (id, delta) in deltas {
            let account = inner
                .accounts
                .get(id)
                .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
            if account.chips + delta < 0 {
                return Err(LedgerError::InsufficientChips {
                    player: id.clone(),
                    balance: account.chips,
                    delta: *delta,
                });
            }
        }
        let now = Utc::now();
        for (id, delta) in deltas {
            let account = inner.accounts.get_mut(id).expect("validated above");
            account.chips += delta;
            account.updated_at = now;
        }
        Ok(())
    }

    async fn save_hand(&self, record: &HandRecord) -> Result<i64, LedgerError> {
        let mut inner = self.inner.lock().await;
        inner.hands.push(record.clone());
        Ok(inner.hands.len() as i64)
    }
}
