//! The real-time game channel.
//!
//! One WebSocket per client. The first frame must be `REQ_JOIN` or
//! `REQ_RECONNECT`; everything after rides the authenticated session.
//! Outbound traffic flows through the session's transport channel so the
//! table loops never touch the socket directly.
//!
//! A dropped socket does not unseat anyone: the session goes into its
//! grace window and a `REQ_RECONNECT` within it resumes play with a full
//! `GAME_SNAPSHOT`.

use super::AppState;
use crate::metrics;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, Stream, StreamExt};
use holdem::game::errors::ErrorCode;
use holdem::net::{ClientEvent, ServerEvent, SocialEvent};
use holdem::session::SessionInfo;
use holdem::{PlayerId, TableId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const OUTBOUND_DEPTH: usize = 256;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    metrics::websocket_connections_total();
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_DEPTH);

    // Writer task: session deliveries out to the wire.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if sink.send(Message::Text(event.to_json())).await.is_err() {
                break;
            }
        }
    });

    // Authentication: the first meaningful frame binds the session.
    let Some((session, table_id)) = authenticate(&mut stream, &tx, &state).await else {
        writer.abort();
        return;
    };
    let player = session.player.clone();
    info!("websocket authenticated: player={player} table={table_id}");

    let _ = tx
        .send(ServerEvent::AuthSuccess {
            session_token: session.session_token.clone(),
            player: player.clone(),
            display_name: session.display_name.clone(),
        })
        .await;

    // Bind to the table channel; the snapshot replay rides the session
    // transport we just attached.
    if let Err(e) = state.registry.join(&player, table_id).await {
        let _ = tx.send(ServerEvent::error(&e)).await;
        state.sessions.disconnect(&player, session.conn_id).await;
        writer.abort();
        return;
    }
    state.social.join(table_id, player.clone()).await;

    // Command loop.
    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        metrics::websocket_messages_received();
        let event = match ClientEvent::from_json(&text) {
            Ok(event) => event,
            Err(e) => {
                debug!("unparseable frame from {player}: {e}");
                let _ = tx
                    .send(ServerEvent::Error {
                        code: ErrorCode::InvalidAction,
                        message: "malformed message".to_string(),
                    })
                    .await;
                continue;
            }
        };
        if !dispatch(&state, &session, table_id, &tx, event).await {
            break;
        }
    }

    // Transport gone (or REQ_LEAVE): the session enters its grace window;
    // the table is untouched until it expires.
    state.social.leave(table_id, &player).await;
    state.sessions.disconnect(&player, session.conn_id).await;
    writer.abort();
    debug!("websocket closed: player={player}");
}

/// Drive the pre-auth handshake. Returns `None` when the socket dies or
/// authentication fails terminally.
async fn authenticate(
    stream: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    tx: &mpsc::Sender<ServerEvent>,
    state: &AppState,
) -> Option<(SessionInfo, TableId)> {
    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return None,
            _ => continue,
        };
        match ClientEvent::from_json(&text) {
            Ok(ClientEvent::Join {
                auth_ticket,
                table_id,
            }) => match state.sessions.open(tx.clone(), &auth_ticket).await {
                Ok(session) => {
                    metrics::auth_attempts_total(true);
                    return Some((session, table_id));
                }
                Err(e) => {
                    metrics::auth_attempts_total(false);
                    warn!("authentication failed: {e}");
                    let _ = tx
                        .send(ServerEvent::AuthFailure {
                            code: e.code(),
                            message: Some(e.to_string()),
                        })
                        .await;
                    return None;
                }
            },
            Ok(ClientEvent::Reconnect {
                auth_ticket,
                table_id,
                last_sequence_id,
            }) => {
                match state
                    .sessions
                    .rebind(tx.clone(), &auth_ticket, last_sequence_id)
                    .await
                {
                    Ok(session) => {
                        metrics::auth_attempts_total(true);
                        return Some((session, table_id));
                    }
                    Err(e) => {
                        metrics::auth_attempts_total(false);
                        let _ = tx
                            .send(ServerEvent::AuthFailure {
                                code: e.code(),
                                message: Some(e.to_string()),
                            })
                            .await;
                        return None;
                    }
                }
            }
            _ => {
                let _ = tx
                    .send(ServerEvent::Error {
                        code: ErrorCode::AuthFailed,
                        message: "authenticate with REQ_JOIN or REQ_RECONNECT first".to_string(),
                    })
                    .await;
            }
        }
    }
    None
}

/// Route one authenticated frame. Returns `false` when the channel should
/// close.
async fn dispatch(
    state: &AppState,
    session: &SessionInfo,
    table_id: TableId,
    tx: &mpsc::Sender<ServerEvent>,
    event: ClientEvent,
) -> bool {
    let player: &PlayerId = &session.player;
    match event {
        ClientEvent::Sit {
            seat_index,
            buy_in,
        } => {
            if let Err(e) = state
                .registry
                .sit(player, &session.display_name, seat_index, buy_in)
                .await
            {
                let _ = tx.send(ServerEvent::error(&e)).await;
            }
        }
        ClientEvent::Ready {} => {
            if let Err(e) = state.registry.ready(player).await {
                let _ = tx.send(ServerEvent::error(&e)).await;
            }
        }
        ClientEvent::Action { action, amount } => {
            let outcome = match ClientEvent::to_player_action(action, amount) {
                Ok(action) => state.registry.action(player, action).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                // Protocol errors go only to the offender.
                let _ = tx.send(ServerEvent::error(&e)).await;
            }
        }
        ClientEvent::Social { kind, target_seat } => {
            state
                .social
                .post(
                    table_id,
                    SocialEvent {
                        from: player.clone(),
                        kind,
                        target_seat,
                    },
                )
                .await;
        }
        ClientEvent::Leave {} => {
            if let Err(e) = state.registry.leave(player).await {
                let _ = tx.send(ServerEvent::error(&e)).await;
            }
            return false;
        }
        ClientEvent::Join { .. } | ClientEvent::Reconnect { .. } => {
            let _ = tx
                .send(ServerEvent::Error {
                    code: ErrorCode::AuthFailed,
                    message: "already authenticated".to_string(),
                })
                .await;
        }
    }
    true
}
