//! The per-table run loop.
//!
//! Each table is serviced by exactly one task consuming an ordered command
//! queue. Timers and ledger settlement live here; the state machine itself
//! stays synchronous. Ledger waits serialise this table's commands and no
//! other table's, which is what the chip-durability rule requires.

use super::config::TableConfig;
use super::messages::{TableCommand, TableSummary};
use crate::game::cards::Deck;
use crate::game::errors::{ErrorCode, TableError};
use crate::game::table::{HandOutcome, TableEvent, TableState, TimerKind};
use crate::game::view::{diff, snapshot_for, TableSnapshot};
use crate::game::{Chips, PlayerId, SeatIndex, TableId};
use crate::ledger::{Ledger, LedgerError};
use crate::net::ServerEvent;
use crate::session::SessionManager;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

const INBOX_DEPTH: usize = 128;
const SETTLE_ATTEMPTS: u32 = 3;

/// Cloneable handle for enqueueing commands onto a table's loop.
#[derive(Clone)]
pub struct TableHandle {
    pub id: TableId,
    sender: mpsc::Sender<TableCommand>,
}

impl TableHandle {
    async fn send(&self, command: TableCommand) -> Result<(), TableError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| TableError::TableNotFound)
    }

    async fn request<T>(
        &self,
        rx: oneshot::Receiver<T>,
        command: TableCommand,
    ) -> Result<T, TableError> {
        self.send(command).await?;
        rx.await.map_err(|_| TableError::TableNotFound)
    }

    pub async fn connect(&self, player: PlayerId) -> Result<(), TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(rx, TableCommand::Connect { player, respond })
            .await
    }

    pub async fn sit(
        &self,
        player: PlayerId,
        display_name: String,
        seat_index: SeatIndex,
        buy_in: Chips,
    ) -> Result<(), TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(
            rx,
            TableCommand::Sit {
                player,
                display_name,
                seat_index,
                buy_in,
                respond,
            },
        )
        .await?
    }

    pub async fn ready(&self, player: PlayerId) -> Result<(), TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(rx, TableCommand::Ready { player, respond })
            .await?
    }

    pub async fn action(
        &self,
        player: PlayerId,
        action: crate::game::table::PlayerAction,
    ) -> Result<(), TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(
            rx,
            TableCommand::Action {
                player,
                action,
                respond,
            },
        )
        .await?
    }

    pub async fn leave(&self, player: PlayerId) -> Result<Chips, TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(rx, TableCommand::Leave { player, respond })
            .await?
    }

    pub async fn summary(&self) -> Result<TableSummary, TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(rx, TableCommand::Summary { respond }).await
    }

    pub async fn shutdown(&self) -> Result<(), TableError> {
        let (respond, rx) = oneshot::channel();
        self.request(rx, TableCommand::Shutdown { respond }).await
    }
}

#[derive(Clone, Copy)]
struct ArmedTimer {
    generation: u64,
    kind: TimerKind,
    deadline: Instant,
}

/// The actor owning one table's god state.
pub struct TableActor {
    state: TableState,
    name: String,
    inbox: mpsc::Receiver<TableCommand>,
    sessions: Arc<SessionManager>,
    ledger: Arc<dyn Ledger>,
    recipients: HashSet<PlayerId>,
    last_views: HashMap<PlayerId, TableSnapshot>,
    armed: Option<ArmedTimer>,
    closed: bool,
}

impl TableActor {
    pub fn new(
        id: TableId,
        config: TableConfig,
        sessions: Arc<SessionManager>,
        ledger: Arc<dyn Ledger>,
        deck: Deck,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_DEPTH);
        let actor = Self {
            state: TableState::new(id, config.rules(), deck),
            name: config.name,
            inbox,
            sessions,
            ledger,
            recipients: HashSet::new(),
            last_views: HashMap::new(),
            armed: None,
            closed: false,
        };
        (actor, TableHandle { id, sender })
    }

    pub async fn run(mut self) {
        info!("table {} '{}' starting", self.state.table_id, self.name);
        loop {
            self.sync_timer();
            let armed = self.armed;
            tokio::select! {
                maybe = self.inbox.recv() => {
                    match maybe {
                        Some(command) => self.handle(command).await,
                        None => break,
                    }
                    if self.closed {
                        break;
                    }
                }
                _ = wait_until(armed) => {
                    if let Some(timer) = armed {
                        self.armed = None;
                        let events = self.state.timer_fired(timer.kind, timer.generation);
                        self.process(events).await;
                    }
                }
            }
            self.fan_out().await;
        }
        info!("table {} '{}' closed", self.state.table_id, self.name);
    }

    /// Keep the armed sleep in step with the machine's pending timer; a
    /// generation change re-arms, clearing cancels.
    fn sync_timer(&mut self) {
        match self.state.pending_timer() {
            Some(pending) => {
                let stale = self
                    .armed
                    .map_or(true, |armed| armed.generation != pending.generation);
                if stale {
                    self.armed = Some(ArmedTimer {
                        generation: pending.generation,
                        kind: pending.kind,
                        deadline: Instant::now() + pending.duration,
                    });
                }
            }
            None => self.armed = None,
        }
    }

    async fn handle(&mut self, command: TableCommand) {
        match command {
            TableCommand::Connect { player, respond } => {
                self.recipients.insert(player.clone());
                self.state.bump_for_snapshot();
                let snapshot = snapshot_for(&self.state, &player);
                self.last_views.insert(player.clone(), snapshot.clone());
                self.sessions
                    .deliver(&player, ServerEvent::Snapshot(snapshot))
                    .await;
                let _ = respond.send(());
            }

            TableCommand::Sit {
                player,
                display_name,
                seat_index,
                buy_in,
                respond,
            } => {
                let result = self.seat_player(player, display_name, seat_index, buy_in).await;
                let _ = respond.send(result);
            }

            TableCommand::Ready { player, respond } => {
                let _ = respond.send(self.state.ready(&player));
            }

            TableCommand::Action {
                player,
                action,
                respond,
            } => match self.state.act(&player, action) {
                Ok(events) => {
                    let _ = respond.send(Ok(()));
                    self.process(events).await;
                }
                Err(e) => {
                    let _ = respond.send(Err(e));
                }
            },

            TableCommand::Leave { player, respond } => {
                let result = match self.state.unseat(&player) {
                    Ok((chips, events)) => {
                        self.process(events).await;
                        Ok(chips)
                    }
                    // Connected but never seated: leaving is still fine.
                    Err(TableError::NotSeated) => Ok(0),
                    Err(e) => Err(e),
                };
                self.recipients.remove(&player);
                self.last_views.remove(&player);
                let _ = respond.send(result);
            }

            TableCommand::Summary { respond } => {
                let _ = respond.send(TableSummary {
                    id: self.state.table_id,
                    name: self.name.clone(),
                    phase: self.state.phase(),
                    seats_filled: self.state.occupied_count(),
                    max_seats: self.state.rules.max_seats,
                    blinds: self.state.rules.blinds.clone(),
                });
            }

            TableCommand::Shutdown { respond } => {
                let seated: Vec<PlayerId> = self
                    .state
                    .seats()
                    .iter()
                    .flatten()
                    .map(|b| b.player.clone())
                    .collect();
                for player in seated {
                    if let Ok((_, events)) = self.state.unseat(&player) {
                        self.process(events).await;
                    }
                }
                self.closed = true;
                let _ = respond.send(());
            }
        }
    }

    /// Buy-in gate: the account must exist and cover the buy-in. The
    /// ledger call is this loop's only suspension besides settlement.
    async fn seat_player(
        &mut self,
        player: PlayerId,
        display_name: String,
        seat_index: SeatIndex,
        buy_in: Chips,
    ) -> Result<(), TableError> {
        let account = self
            .ledger
            .find_or_create(&player, &display_name)
            .await
            .map_err(ledger_error)?;
        if account.chips < buy_in {
            return Err(TableError::InsufficientChips);
        }
        self.state.seat(player, display_name, seat_index, buy_in)
    }

    async fn process(&mut self, events: Vec<TableEvent>) {
        for event in events {
            match event {
                TableEvent::ActionTaken {
                    player,
                    action,
                    new_pot,
                } => {
                    let broadcast = ServerEvent::player_action(player, &action, new_pot);
                    self.broadcast(broadcast).await;
                }
                TableEvent::HandResult { winners, pots } => {
                    self.broadcast(ServerEvent::HandResult { winners, pots }).await;
                }
                TableEvent::HandComplete(outcome) => {
                    self.settle(outcome).await;
                }
            }
        }
    }

    /// Persist a finished hand: balance deltas first, then the history
    /// row, with a bounded retry. An exhausted retry leaves the hand
    /// unsettled; the state machine holds the table and the button does
    /// not advance.
    async fn settle(&mut self, outcome: HandOutcome) {
        let table_id = self.state.table_id;
        let hand_no = outcome.record.hand_no;
        let mut adjusted = outcome.deltas.is_empty();
        let mut last_error: Option<LedgerError> = None;

        for attempt in 1..=SETTLE_ATTEMPTS {
            if !adjusted {
                match self.ledger.adjust_many(&outcome.deltas).await {
                    Ok(()) => adjusted = true,
                    Err(e) => {
                        warn!("table {table_id}: adjust_many attempt {attempt} failed: {e}");
                        last_error = Some(e);
                        tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                        continue;
                    }
                }
            }
            match self.ledger.save_hand(&outcome.record).await {
                Ok(id) => {
                    debug!("table {table_id}: hand {hand_no} persisted as history {id}");
                    self.state.mark_settled();
                    return;
                }
                Err(e) => {
                    warn!("table {table_id}: save_hand attempt {attempt} failed: {e}");
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
            }
        }

        error!("table {table_id}: hand {hand_no} settlement failed; holding table");
        let code = match last_error {
            Some(LedgerError::InsufficientChips { .. }) => ErrorCode::InsufficientChips,
            _ => ErrorCode::InvalidAction,
        };
        let seated: Vec<PlayerId> = self
            .state
            .seats()
            .iter()
            .flatten()
            .map(|b| b.player.clone())
            .collect();
        for player in seated {
            self.sessions
                .deliver(
                    &player,
                    ServerEvent::Error {
                        code,
                        message: "hand settlement failed; table paused".to_string(),
                    },
                )
                .await;
        }
    }

    async fn broadcast(&self, event: ServerEvent) {
        for recipient in &self.recipients {
            self.sessions.deliver(recipient, event.clone()).await;
        }
    }

    /// Project and deliver per-recipient views whenever the sequence
    /// moved: a snapshot for first-time viewers, a delta for the rest.
    async fn fan_out(&mut self) {
        if self.recipients.is_empty() {
            return;
        }
        let sequence = self.state.sequence();
        for player in self.recipients.clone() {
            let up_to_date = self
                .last_views
                .get(&player)
                .is_some_and(|prev| prev.sequence == sequence);
            if up_to_date {
                continue;
            }
            let snapshot = snapshot_for(&self.state, &player);
            let event = match self.last_views.get(&player) {
                Some(previous) => ServerEvent::Patch(diff(previous, &snapshot)),
                None => ServerEvent::Snapshot(snapshot.clone()),
            };
            self.last_views.insert(player.clone(), snapshot);
            self.sessions.deliver(&player, event).await;
        }
    }
}

fn ledger_error(e: LedgerError) -> TableError {
    match e {
        LedgerError::InsufficientChips { .. } => TableError::InsufficientChips,
        other => TableError::Internal(other.to_string()),
    }
}

async fn wait_until(armed: Option<ArmedTimer>) {
    match armed {
        Some(timer) => tokio::time::sleep_until(timer.deadline).await,
        None => std::future::pending().await,
    }
}
