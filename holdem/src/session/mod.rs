//! Identity-bound sessions.
//!
//! A verified player identity maps to at most one session. The session
//! outlives its transport: a disconnect starts a grace timer, and only
//! when that expires with the player still gone is the session destroyed
//! and an expiry notice emitted so the registry can unseat them.

use crate::game::errors::ErrorCode;
use crate::game::{PlayerId, TableId};
use crate::net::ServerEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    #[error("auth ticket rejected")]
    InvalidTicket,
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("no session to rebind within the grace window")]
    NoSession,
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTicket => ErrorCode::InvalidTicket,
            Self::ProviderUnavailable(_) | Self::NoSession => ErrorCode::AuthFailed,
        }
    }
}

/// A verified identity: the stable player identifier plus display name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub player: PlayerId,
    pub display_name: String,
}

/// The identity-provider adapter boundary. The production implementation
/// calls the Steam Web API; it lives outside this crate.
#[async_trait]
pub trait TicketVerifier: Send + Sync {
    async fn verify(&self, ticket: &str) -> Result<Identity, AuthError>;
}

/// Mock verifier for tests and local play. Accepts tickets of the form
/// `mock:<steam_id>:<display_name>` and rejects everything else.
pub struct MockVerifier;

#[async_trait]
impl TicketVerifier for MockVerifier {
    async fn verify(&self, ticket: &str) -> Result<Identity, AuthError> {
        let mut parts = ticket.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("mock"), Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => {
                Ok(Identity {
                    player: PlayerId::from(id),
                    display_name: name.to_string(),
                })
            }
            _ => Err(AuthError::InvalidTicket),
        }
    }
}

/// What `open`/`rebind` hand back to the transport layer.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    pub player: PlayerId,
    pub display_name: String,
    pub session_token: String,
    pub conn_id: u64,
}

struct Session {
    display_name: String,
    table: Option<TableId>,
    session_token: String,
    transport: Option<mpsc::Sender<ServerEvent>>,
    conn_id: u64,
    last_sequence: u64,
    connected: bool,
    last_activity: DateTime<Utc>,
}

/// Owns every session. Shared between the transport ingress tasks and the
/// table actors; all access goes through the internal lock.
pub struct SessionManager {
    sessions: RwLock<HashMap<PlayerId, Session>>,
    verifier: Arc<dyn TicketVerifier>,
    grace: Duration,
    expired_tx: mpsc::UnboundedSender<PlayerId>,
    next_conn: AtomicU64,
}

impl SessionManager {
    /// Returns the manager and the stream of grace-expired players the
    /// caller must drain (unseating them from any table).
    pub fn new(
        verifier: Arc<dyn TicketVerifier>,
        grace: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PlayerId>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            verifier,
            grace,
            expired_tx,
            next_conn: AtomicU64::new(1),
        });
        (manager, expired_rx)
    }

    /// Verify the ticket and create (or take over) the player's session,
    /// attaching the transport. The session token rotates on every open.
    pub async fn open(
        &self,
        transport: mpsc::Sender<ServerEvent>,
        ticket: &str,
    ) -> Result<SessionInfo, AuthError> {
        let identity = self.verifier.verify(ticket).await?;
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let token = Uuid::new_v4().to_string();

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(identity.player.clone())
            .or_insert_with(|| Session {
                display_name: identity.display_name.clone(),
                table: None,
                session_token: String::new(),
                transport: None,
                conn_id: 0,
                last_sequence: 0,
                connected: false,
                last_activity: Utc::now(),
            });
        session.display_name = identity.display_name.clone();
        session.session_token = token.clone();
        session.transport = Some(transport);
        session.conn_id = conn_id;
        session.connected = true;
        session.last_activity = Utc::now();

        info!("session opened for {}", identity.player);
        Ok(SessionInfo {
            player: identity.player,
            display_name: identity.display_name,
            session_token: token,
            conn_id,
        })
    }

    /// Attach a new transport to an existing session. Fails when the
    /// session already expired; the client must `open` again. The caller
    /// replays a full snapshot afterwards.
    pub async fn rebind(
        &self,
        transport: mpsc::Sender<ServerEvent>,
        ticket: &str,
        last_seen_sequence: u64,
    ) -> Result<SessionInfo, AuthError> {
        let identity = self.verifier.verify(ticket).await?;
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&identity.player)
            .ok_or(AuthError::NoSession)?;
        session.transport = Some(transport);
        session.conn_id = conn_id;
        session.connected = true;
        session.last_activity = Utc::now();
        // Resume delivery from what the client proved it has seen.
        session.last_sequence = session.last_sequence.min(last_seen_sequence);

        info!("session rebound for {}", identity.player);
        Ok(SessionInfo {
            player: identity.player,
            display_name: session.display_name.clone(),
            session_token: session.session_token.clone(),
            conn_id,
        })
    }

    /// The transport dropped. Marks the session disconnected and starts
    /// the grace clock; a rebind in the meantime cancels expiry because
    /// the connection id moves on.
    pub async fn disconnect(self: &Arc<Self>, player: &PlayerId, conn_id: u64) {
        {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(player) else {
                return;
            };
            if session.conn_id != conn_id {
                return; // a newer transport already took over
            }
            session.connected = false;
            session.transport = None;
            session.last_activity = Utc::now();
        }
        debug!("session for {player} disconnected, grace timer armed");

        let manager = Arc::clone(self);
        let player = player.clone();
        tokio::spawn(async move {
            tokio::time::sleep(manager.grace).await;
            let mut sessions = manager.sessions.write().await;
            let expired = sessions
                .get(&player)
                .is_some_and(|s| !s.connected && s.conn_id == conn_id);
            if expired {
                sessions.remove(&player);
                drop(sessions);
                info!("session for {player} expired after grace window");
                let _ = manager.expired_tx.send(player);
            }
        });
    }

    /// Best-effort FIFO delivery. Views carrying a sequence at or below
    /// the session's last delivered one are skipped; the counter only
    /// moves forward.
    pub async fn deliver(&self, player: &PlayerId, event: ServerEvent) {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(player) else {
            return;
        };
        if let Some(sequence) = event.sequence() {
            if sequence <= session.last_sequence {
                return;
            }
            session.last_sequence = sequence;
        }
        if let Some(transport) = &session.transport {
            if let Err(e) = transport.try_send(event) {
                warn!("dropping event for {player}: {e}");
            }
        }
    }

    pub async fn bind_table(&self, player: &PlayerId, table: Option<TableId>) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(player) {
            session.table = table;
        }
    }

    pub async fn table_of(&self, player: &PlayerId) -> Option<TableId> {
        self.sessions.read().await.get(player).and_then(|s| s.table)
    }

    pub async fn last_sequence(&self, player: &PlayerId) -> Option<u64> {
        self.sessions.read().await.get(player).map(|s| s.last_sequence)
    }

    pub async fn is_connected(&self, player: &PlayerId) -> bool {
        self.sessions
            .read()
            .await
            .get(player)
            .is_some_and(|s| s.connected)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
