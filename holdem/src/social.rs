//! The high-frequency social channel.
//!
//! A pure pub-sub buffer per table, flushed on a fixed tick. It never
//! touches god state and never blocks a table loop: when a member's
//! outbox is full the oldest entry is dropped.

use crate::game::{PlayerId, TableId};
use crate::net::{ServerEvent, SocialEvent};
use crate::session::SessionManager;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Default per-member outbox bound.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

#[derive(Default)]
struct Room {
    outboxes: HashMap<PlayerId, VecDeque<SocialEvent>>,
}

pub struct SocialHub {
    rooms: RwLock<HashMap<TableId, Room>>,
    capacity: usize,
}

impl SocialHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
        })
    }

    pub async fn join(&self, table: TableId, player: PlayerId) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(table)
            .or_default()
            .outboxes
            .entry(player)
            .or_default();
    }

    pub async fn leave(&self, table: TableId, player: &PlayerId) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&table) {
            room.outboxes.remove(player);
            if room.outboxes.is_empty() {
                rooms.remove(&table);
            }
        }
    }

    /// Queue an event for every member of the table. Drop-oldest on a
    /// full outbox keeps the channel lossy rather than blocking.
    pub async fn post(&self, table: TableId, event: SocialEvent) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&table) else {
            return;
        };
        for (member, outbox) in &mut room.outboxes {
            if outbox.len() >= self.capacity {
                outbox.pop_front();
                debug!("social outbox full for {member}, dropping oldest");
            }
            outbox.push_back(event.clone());
        }
    }

    /// Drain every non-empty outbox into one batched `SOCIAL` frame per
    /// member.
    pub async fn flush(&self, sessions: &SessionManager) {
        let batches: Vec<(PlayerId, Vec<SocialEvent>)> = {
            let mut rooms = self.rooms.write().await;
            rooms
                .values_mut()
                .flat_map(|room| {
                    room.outboxes
                        .iter_mut()
                        .filter(|(_, outbox)| !outbox.is_empty())
                        .map(|(member, outbox)| (member.clone(), outbox.drain(..).collect()))
                })
                .collect()
        };
        for (member, events) in batches {
            sessions
                .deliver(&member, ServerEvent::Social { events })
                .await;
        }
    }

    /// Run the flusher at `tick_hz` until aborted.
    pub fn spawn_flusher(
        self: &Arc<Self>,
        sessions: Arc<SessionManager>,
        tick_hz: u32,
    ) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = Duration::from_millis(1000 / u64::from(tick_hz.max(1)));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                hub.flush(&sessions).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(from: &str, kind: &str) -> SocialEvent {
        SocialEvent {
            from: PlayerId::from(from),
            kind: kind.to_string(),
            target_seat: None,
        }
    }

    #[tokio::test]
    async fn test_post_reaches_every_member() {
        let hub = SocialHub::new(DEFAULT_OUTBOX_CAPACITY);
        hub.join(1, PlayerId::from("a")).await;
        hub.join(1, PlayerId::from("b")).await;
        hub.post(1, event("a", "wave")).await;

        let rooms = hub.rooms.read().await;
        let room = rooms.get(&1).unwrap();
        assert_eq!(room.outboxes[&PlayerId::from("a")].len(), 1);
        assert_eq!(room.outboxes[&PlayerId::from("b")].len(), 1);
    }

    #[tokio::test]
    async fn test_full_outbox_drops_oldest() {
        let hub = SocialHub::new(2);
        hub.join(1, PlayerId::from("a")).await;
        hub.post(1, event("a", "first")).await;
        hub.post(1, event("a", "second")).await;
        hub.post(1, event("a", "third")).await;

        let rooms = hub.rooms.read().await;
        let outbox = &rooms.get(&1).unwrap().outboxes[&PlayerId::from("a")];
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].kind, "second");
        assert_eq!(outbox[1].kind, "third");
    }

    #[tokio::test]
    async fn test_post_to_empty_table_is_noop() {
        let hub = SocialHub::new(4);
        hub.post(99, event("a", "wave")).await;
        assert!(hub.rooms.read().await.get(&99).is_none());
    }
}
