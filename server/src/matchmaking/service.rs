//! Matchmaking service - connection registry, queue, and match lifecycle

use dashmap::DashMap;
use glam::Vec2;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use shared::protocol::{ClientMsg, EndReason, ServerMsg};

use crate::game::{ArenaMatch, MatchHandle, Participant, PlayerEvent, PlayerEventKind};
use crate::store::users::UserStore;

use super::queue::{QueuedConnection, WaitingQueue};

/// A connected socket registered with the service
#[derive(Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    pub display_name: String,
    /// Set when the connection belongs to a logged-in account
    pub username: Option<String>,
    /// Outbound channel to this connection's socket writer
    pub tx: mpsc::Sender<ServerMsg>,
}

/// Matchmaking service shared by every connection
#[derive(Clone)]
pub struct MatchmakingService {
    queue: Arc<Mutex<WaitingQueue>>,
    /// All connected sockets
    connections: Arc<DashMap<Uuid, ConnectionHandle>>,
    /// Map of connection -> its running match
    active_matches: Arc<DashMap<Uuid, MatchHandle>>,
    users: UserStore,
    /// Arena dimensions handed to every match
    bounds: Vec2,
}

impl MatchmakingService {
    pub fn new(bounds: Vec2, users: UserStore) -> Self {
        Self {
            queue: Arc::new(Mutex::new(WaitingQueue::new())),
            connections: Arc::new(DashMap::new()),
            active_matches: Arc::new(DashMap::new()),
            users,
            bounds,
        }
    }

    /// Register a freshly opened connection. Greets it and shares the
    /// current queue size so menus can show a live count.
    pub async fn register(&self, handle: ConnectionHandle) {
        let conn_id = handle.conn_id;
        let tx = handle.tx.clone();
        self.connections.insert(conn_id, handle);

        let _ = tx.try_send(ServerMsg::Hello);
        let n = self.queue.lock().await.len() as u32;
        let _ = tx.try_send(ServerMsg::QueueCount { n });

        info!(conn_id = %conn_id, "Connection registered");
    }

    /// Tear down everything tied to a closed connection: its queue slot
    /// and, if it was mid-match, the match itself.
    pub async fn disconnect(&self, conn_id: Uuid) {
        self.connections.remove(&conn_id);

        let dequeued = {
            let mut queue = self.queue.lock().await;
            queue.remove(conn_id).map(|_| queue.len())
        };
        if let Some(n) = dequeued {
            self.broadcast_queue_count(n);
        }

        if let Some((_, handle)) = self.active_matches.remove(&conn_id) {
            let event = PlayerEvent {
                conn_id,
                kind: PlayerEventKind::Disconnected,
            };
            if handle.events.send(event).await.is_err() {
                warn!(conn_id = %conn_id, "Match already gone during disconnect");
            }
        }

        info!(conn_id = %conn_id, "Connection unregistered");
    }

    /// Enter the matchmaking queue. Ignored when the connection is
    /// already queued or already fighting.
    pub async fn join_queue(&self, conn_id: Uuid) {
        if self.active_matches.contains_key(&conn_id) {
            return;
        }

        let (after_join, pairs, after_pairing) = {
            let mut queue = self.queue.lock().await;
            if queue.contains(&conn_id) {
                return;
            }
            queue.enqueue(conn_id);
            let after_join = queue.len();

            if let Some(conn) = self.connections.get(&conn_id) {
                let _ = conn.tx.try_send(ServerMsg::Queued);
            }
            info!(conn_id = %conn_id, queue_size = after_join, "Connection joined matchmaking queue");

            let mut pairs = Vec::new();
            while let Some(pair) = queue.take_pair() {
                pairs.push(pair);
            }
            (after_join, pairs, queue.len())
        };

        self.broadcast_queue_count(after_join);
        if !pairs.is_empty() {
            self.broadcast_queue_count(after_pairing);
        }

        for pair in pairs {
            self.create_match(pair).await;
        }
    }

    /// Leave the matchmaking queue if currently in it.
    pub async fn leave_queue(&self, conn_id: Uuid) {
        let mut queue = self.queue.lock().await;
        if queue.remove(conn_id).is_none() {
            return;
        }
        let n = queue.len();
        drop(queue);
        self.broadcast_queue_count(n);
    }

    /// Route an in-match message to the connection's running match.
    /// A connection with no match is a silent no-op.
    pub async fn forward_to_match(&self, conn_id: Uuid, msg: ClientMsg) {
        let handle = match self.active_matches.get(&conn_id) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        let event = PlayerEvent {
            conn_id,
            kind: PlayerEventKind::Msg(msg),
        };
        let _ = handle.events.send(event).await;
    }

    /// Build and launch a match for a freshly dequeued pair.
    async fn create_match(&self, pair: [QueuedConnection; 2]) {
        let mut handles = Vec::new();
        for queued in &pair {
            if let Some(conn) = self.connections.get(&queued.conn_id) {
                handles.push(conn.value().clone());
            }
        }

        // A side that vanished between pairing and now sends the
        // survivor back to the queue
        if handles.len() < 2 {
            warn!("Paired connection vanished before match start");
            let mut queue = self.queue.lock().await;
            for conn in &handles {
                queue.enqueue(conn.conn_id);
            }
            let n = queue.len();
            drop(queue);
            self.broadcast_queue_count(n);
            return;
        }

        let participants: Vec<Participant> = handles
            .iter()
            .map(|conn| Participant {
                id: conn.conn_id,
                name: conn.display_name.clone(),
                tx: conn.tx.clone(),
            })
            .collect();

        let match_id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (arena, handle) = ArenaMatch::new(match_id, seed, self.bounds, participants);

        for conn in &handles {
            self.active_matches.insert(conn.conn_id, handle.clone());
        }

        info!(match_id = %match_id, "Created new match");

        let active_matches = self.active_matches.clone();
        let users = self.users.clone();
        let members: Vec<(Uuid, Option<String>)> = handles
            .iter()
            .map(|conn| (conn.conn_id, conn.username.clone()))
            .collect();

        tokio::spawn(async move {
            let outcome = arena.run().await;

            for (conn_id, _) in &members {
                active_matches.remove(conn_id);
            }

            // Only a decided fight counts toward account stats
            if let (EndReason::Victory, Some(winner)) = (outcome.reason, outcome.winner) {
                for (conn_id, username) in &members {
                    let Some(username) = username else { continue };
                    if let Err(err) = users.record_result(username, *conn_id == winner).await {
                        warn!(username = %username, error = %err, "Failed to record match result");
                    }
                }
            }

            info!(match_id = %match_id, reason = ?outcome.reason, "Match cleaned up");
        });
    }

    fn broadcast_queue_count(&self, n: usize) {
        let msg = ServerMsg::QueueCount { n: n as u32 };
        for conn in self.connections.iter() {
            let _ = conn.tx.try_send(msg.clone());
        }
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of distinct running matches.
    pub fn active_match_count(&self) -> usize {
        let mut ids: Vec<Uuid> = self
            .active_matches
            .iter()
            .map(|entry| entry.value().match_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_service(dir: &std::path::Path) -> MatchmakingService {
        MatchmakingService::new(Vec2::new(1200.0, 800.0), UserStore::new(dir.to_path_buf()))
    }

    async fn connect(
        service: &MatchmakingService,
        name: &str,
    ) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(2048);
        let conn_id = Uuid::new_v4();
        service
            .register(ConnectionHandle {
                conn_id,
                display_name: name.to_string(),
                username: None,
                tx,
            })
            .await;
        (conn_id, rx)
    }

    async fn recv_match_start(rx: &mut mpsc::Receiver<ServerMsg>) -> (Uuid, Uuid, Vec<Uuid>) {
        let deadline = Duration::from_secs(30);
        tokio::time::timeout(deadline, async {
            loop {
                match rx.recv().await {
                    Some(ServerMsg::MatchStart {
                        game_id,
                        you,
                        roster,
                        ..
                    }) => {
                        return (game_id, you, roster.iter().map(|r| r.id).collect());
                    }
                    Some(_) => continue,
                    None => panic!("channel closed before matchStart"),
                }
            }
        })
        .await
        .expect("no matchStart within deadline")
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn two_joiners_are_paired_into_one_match() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path());
        let (a, mut rx_a) = connect(&service, "alice").await;
        let (b, mut rx_b) = connect(&service, "bob").await;

        service.join_queue(a).await;

        let early: Vec<ServerMsg> = drain(&mut rx_a);
        assert!(early.iter().any(|m| matches!(m, ServerMsg::Queued)));
        assert!(early
            .iter()
            .any(|m| matches!(m, ServerMsg::QueueCount { n: 1 })));

        service.join_queue(b).await;

        let (game_a, you_a, roster_a) = recv_match_start(&mut rx_a).await;
        let (game_b, you_b, roster_b) = recv_match_start(&mut rx_b).await;

        assert_eq!(game_a, game_b);
        assert_eq!(you_a, a);
        assert_eq!(you_b, b);
        assert!(roster_a.contains(&b));
        assert!(roster_b.contains(&a));

        assert_eq!(service.queue_size().await, 0);
        assert_eq!(service.active_match_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn four_joiners_form_two_matches_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path());

        let mut conns = Vec::new();
        for name in ["a", "b", "c", "d"] {
            conns.push(connect(&service, name).await);
        }
        for (id, _) in &conns {
            service.join_queue(*id).await;
        }

        let mut games = Vec::new();
        for (_, rx) in conns.iter_mut() {
            let (game_id, _, _) = recv_match_start(rx).await;
            games.push(game_id);
        }

        assert_eq!(games[0], games[1]);
        assert_eq!(games[2], games[3]);
        assert_ne!(games[0], games[2]);
        assert_eq!(service.active_match_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_the_queue_broadcasts_the_reduced_count() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path());
        let (a, _rx_a) = connect(&service, "alice").await;
        let (_b, mut rx_b) = connect(&service, "bob").await;

        service.join_queue(a).await;
        service.leave_queue(a).await;

        let msgs = drain(&mut rx_b);
        let counts: Vec<u32> = msgs
            .iter()
            .filter_map(|m| match m {
                ServerMsg::QueueCount { n } => Some(*n),
                _ => None,
            })
            .collect();
        assert!(counts.windows(2).any(|w| w == [1, 0]));
        assert_eq!(service.queue_size().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn joining_while_in_a_match_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path());
        let (a, mut rx_a) = connect(&service, "alice").await;
        let (b, mut rx_b) = connect(&service, "bob").await;

        service.join_queue(a).await;
        service.join_queue(b).await;
        recv_match_start(&mut rx_a).await;
        recv_match_start(&mut rx_b).await;

        drain(&mut rx_a);
        service.join_queue(a).await;

        assert_eq!(service.queue_size().await, 0);
        assert!(!drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMsg::Queued)));
    }

    #[tokio::test(start_paused = true)]
    async fn mid_match_disconnect_notifies_the_other_side() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path());
        let (a, mut rx_a) = connect(&service, "alice").await;
        let (b, mut rx_b) = connect(&service, "bob").await;

        service.join_queue(a).await;
        service.join_queue(b).await;
        recv_match_start(&mut rx_a).await;
        recv_match_start(&mut rx_b).await;

        service.disconnect(a).await;

        let end = tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                match rx_b.recv().await {
                    Some(ServerMsg::MatchEnd { reason, .. }) => return reason,
                    Some(_) => continue,
                    None => panic!("channel closed before matchEnd"),
                }
            }
        })
        .await
        .expect("no matchEnd within deadline");
        assert_eq!(end, EndReason::Dc);

        // The match task unwinds its registrations shortly after
        for _ in 0..50 {
            if service.active_match_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.active_match_count(), 0);
    }
}
