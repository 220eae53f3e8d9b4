//! Directory of live tables and the player-to-table binding.
//!
//! The registry's maps are the only state shared between transport
//! ingress tasks and the table loops, under a reader-writer lock: many
//! lookups, rare writes. A player is bound to at most one table at a
//! time; seating at a second table is refused.

use super::actor::{TableActor, TableHandle};
use super::config::TableConfig;
use super::messages::TableSummary;
use crate::game::cards::Deck;
use crate::game::errors::TableError;
use crate::game::table::PlayerAction;
use crate::game::{Chips, PlayerId, SeatIndex, TableId};
use crate::ledger::Ledger;
use crate::session::SessionManager;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct TableRegistry {
    sessions: Arc<SessionManager>,
    ledger: Arc<dyn Ledger>,
    tables: RwLock<HashMap<TableId, TableHandle>>,
    bindings: RwLock<HashMap<PlayerId, TableId>>,
    next_id: RwLock<TableId>,
}

impl TableRegistry {
    pub fn new(sessions: Arc<SessionManager>, ledger: Arc<dyn Ledger>) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            ledger,
            tables: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            next_id: RwLock::new(1),
        })
    }

    /// Create a table with an entropy-seeded deck and spawn its loop.
    pub async fn create_table(&self, config: TableConfig) -> Result<TableId, TableError> {
        self.create_table_with_deck(config, Deck::new()).await
    }

    /// Deck injection for deterministic tests.
    pub async fn create_table_with_deck(
        &self,
        config: TableConfig,
        deck: Deck,
    ) -> Result<TableId, TableError> {
        config.validate().map_err(TableError::InvalidAction)?;

        let id = {
            let mut next = self.next_id.write().await;
            let id = *next;
            *next += 1;
            id
        };
        let (actor, handle) = TableActor::new(
            id,
            config,
            Arc::clone(&self.sessions),
            Arc::clone(&self.ledger),
            deck,
        );
        self.tables.write().await.insert(id, handle);
        tokio::spawn(actor.run());
        info!("created table {id}");
        Ok(id)
    }

    pub async fn get(&self, id: TableId) -> Option<TableHandle> {
        self.tables.read().await.get(&id).cloned()
    }

    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Public summaries for the lobby listing.
    pub async fn list(&self) -> Vec<TableSummary> {
        let handles: Vec<TableHandle> = self.tables.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.summary().await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("table {} skipped from listing: {e}", handle.id),
            }
        }
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Bind a player's session to a table channel and replay a snapshot.
    /// Rebinding to the same table is how reconnect replays state; a
    /// different table while bound is refused.
    pub async fn join(&self, player: &PlayerId, table_id: TableId) -> Result<(), TableError> {
        let handle = self.get(table_id).await.ok_or(TableError::TableNotFound)?;
        {
            let mut bindings = self.bindings.write().await;
            let bound = bindings.get(player).copied();
            if bound.is_some_and(|t| t != table_id) {
                return Err(TableError::AlreadySeated);
            }
            bindings.insert(player.clone(), table_id);
        }
        self.sessions.bind_table(player, Some(table_id)).await;
        handle.connect(player.clone()).await
    }

    async fn bound_handle(&self, player: &PlayerId) -> Result<TableHandle, TableError> {
        let table_id = self
            .bindings
            .read()
            .await
            .get(player)
            .copied()
            .ok_or(TableError::NotSeated)?;
        self.get(table_id).await.ok_or(TableError::TableNotFound)
    }

    pub async fn sit(
        &self,
        player: &PlayerId,
        display_name: &str,
        seat_index: SeatIndex,
        buy_in: Chips,
    ) -> Result<(), TableError> {
        let handle = self.bound_handle(player).await?;
        handle
            .sit(player.clone(), display_name.to_string(), seat_index, buy_in)
            .await
    }

    pub async fn ready(&self, player: &PlayerId) -> Result<(), TableError> {
        let handle = self.bound_handle(player).await?;
        handle.ready(player.clone()).await
    }

    pub async fn action(
        &self,
        player: &PlayerId,
        action: PlayerAction,
    ) -> Result<(), TableError> {
        let handle = self.bound_handle(player).await?;
        handle.action(player.clone(), action).await
    }

    /// Unseat and unbind. Harmless when the player is bound nowhere, so
    /// grace expiry can call it unconditionally.
    pub async fn leave(&self, player: &PlayerId) -> Result<Chips, TableError> {
        let handle = match self.bound_handle(player).await {
            Ok(handle) => handle,
            Err(TableError::NotSeated) => return Ok(0),
            Err(e) => return Err(e),
        };
        let chips = handle.leave(player.clone()).await?;
        self.bindings.write().await.remove(player);
        self.sessions.bind_table(player, None).await;
        Ok(chips)
    }

    /// Tear a table down, unseating everyone bound to it first.
    pub async fn destroy(&self, table_id: TableId) -> Result<(), TableError> {
        let handle = {
            let mut tables = self.tables.write().await;
            tables.remove(&table_id).ok_or(TableError::TableNotFound)?
        };
        let orphans: Vec<PlayerId> = {
            let mut bindings = self.bindings.write().await;
            let orphans = bindings
                .iter()
                .filter(|(_, &t)| t == table_id)
                .map(|(p, _)| p.clone())
                .collect();
            bindings.retain(|_, &mut t| t != table_id);
            orphans
        };
        for player in &orphans {
            self.sessions.bind_table(player, None).await;
        }
        handle.shutdown().await?;
        info!("destroyed table {table_id}");
        Ok(())
    }

    /// Drain the session manager's grace-expiry stream, unseating each
    /// expired player. Spawned once at startup.
    pub fn spawn_expiry_sweeper(
        self: &Arc<Self>,
        mut expired: tokio::sync::mpsc::UnboundedReceiver<PlayerId>,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(player) = expired.recv().await {
                info!("grace expired for {player}; unseating");
                if let Err(e) = registry.leave(&player).await {
                    warn!("failed to unseat expired {player}: {e}");
                }
            }
        })
    }
}
