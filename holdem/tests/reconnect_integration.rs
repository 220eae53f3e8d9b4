//! Session reconnect: a transport drop mid-hand, a rebind inside the
//! grace window, and a full snapshot replay that supersedes everything
//! the client had seen.

use holdem::game::table::{Phase, PlayerAction};
use holdem::game::view::HoleCardsView;
use holdem::ledger::{Ledger, MemoryLedger};
use holdem::net::ServerEvent;
use holdem::session::{MockVerifier, SessionManager};
use holdem::table::{TableConfig, TableRegistry};
use holdem::{Deck, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn fast_config() -> TableConfig {
    TableConfig {
        countdown: Duration::from_millis(10),
        turn_timeout: Duration::from_secs(10),
        ..Default::default()
    }
}

async fn recv_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event within a second")
        .expect("channel open")
}

#[tokio::test]
async fn test_reconnect_replays_snapshot_with_identical_seat() {
    let (sessions, expired) =
        SessionManager::new(Arc::new(MockVerifier), Duration::from_secs(60));
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new(1000));
    let registry = TableRegistry::new(Arc::clone(&sessions), ledger);
    registry.spawn_expiry_sweeper(expired);
    let table_id = registry
        .create_table_with_deck(fast_config(), Deck::seeded(42))
        .await
        .unwrap();

    // Two players sit and the hand deals.
    let mut transports = Vec::new();
    let mut players: Vec<PlayerId> = Vec::new();
    let mut conn_ids = Vec::new();
    for (i, name) in ["p1", "p2"].iter().enumerate() {
        let (tx, rx) = mpsc::channel(256);
        let info = sessions
            .open(tx, &format!("mock:{name}:{name}"))
            .await
            .unwrap();
        registry.join(&info.player, table_id).await.unwrap();
        registry.sit(&info.player, name, i, 1000).await.unwrap();
        registry.ready(&info.player).await.unwrap();
        transports.push(rx);
        conn_ids.push(info.conn_id);
        players.push(info.player);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // P1 (dealer, small blind) acts, then drops before reading the ack.
    registry
        .action(&players[0], PlayerAction::Call)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Capture what P1 knew before the drop: last sequence and hole cards.
    let mut last_sequence = 0;
    let mut hole_before = None;
    while let Ok(event) = transports[0].try_recv() {
        if let Some(sequence) = event.sequence() {
            last_sequence = sequence;
        }
        let player_views = match &event {
            ServerEvent::Snapshot(s) => Some(&s.players),
            ServerEvent::Patch(p) => p.players.as_ref(),
            _ => None,
        };
        if let Some(views) = player_views {
            if let Some(me) = views.iter().find(|p| p.player == players[0]) {
                if let HoleCardsView::Shown(cards) = &me.hole_cards {
                    hole_before = Some(*cards);
                }
            }
        }
    }
    assert!(last_sequence > 0, "p1 saw state before the drop");
    let hole_before = hole_before.expect("p1 saw its hole cards");
    drop(transports.remove(0));
    sessions.disconnect(&players[0], conn_ids[0]).await;
    assert!(!sessions.is_connected(&players[0]).await);

    // Rebind within the grace window with the last seen sequence, then
    // rejoin the table channel for the snapshot replay.
    let (tx2, mut rx2) = mpsc::channel(256);
    let info = sessions
        .rebind(tx2, "mock:p1:p1", last_sequence)
        .await
        .unwrap();
    assert_eq!(info.player, players[0]);
    registry.join(&players[0], table_id).await.unwrap();

    let event = recv_event(&mut rx2).await;
    let ServerEvent::Snapshot(snapshot) = event else {
        panic!("expected GAME_SNAPSHOT on reconnect, got {event:?}");
    };
    assert!(
        snapshot.sequence > last_sequence,
        "replayed snapshot supersedes the last delivered sequence"
    );
    assert_eq!(snapshot.phase, Phase::PreFlop);

    let me = snapshot
        .players
        .iter()
        .find(|p| p.player == players[0])
        .expect("p1 still seated");
    assert_eq!(me.stack, 980, "stack unchanged across the reconnect");
    assert_eq!(
        me.hole_cards,
        HoleCardsView::Shown(hole_before),
        "identical hole cards after reconnect"
    );
}

#[tokio::test]
async fn test_grace_expiry_unseats_the_player() {
    let (sessions, expired) =
        SessionManager::new(Arc::new(MockVerifier), Duration::from_millis(30));
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new(1000));
    let registry = TableRegistry::new(Arc::clone(&sessions), ledger);
    registry.spawn_expiry_sweeper(expired);
    let table_id = registry
        .create_table_with_deck(fast_config(), Deck::seeded(7))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(64);
    let info = sessions.open(tx, "mock:gone:Gone").await.unwrap();
    registry.join(&info.player, table_id).await.unwrap();
    registry.sit(&info.player, "Gone", 0, 1000).await.unwrap();

    sessions.disconnect(&info.player, info.conn_id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let listing = registry.list().await;
    assert_eq!(listing[0].seats_filled, 0, "expired player unseated");
    assert_eq!(sessions.session_count().await, 0, "session destroyed");
}
