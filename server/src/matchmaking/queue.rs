//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::Instant;
use uuid::Uuid;

/// Connection waiting in the queue
#[derive(Debug, Clone)]
pub struct QueuedConnection {
    pub conn_id: Uuid,
    pub queued_at: Instant,
}

impl QueuedConnection {
    pub fn new(conn_id: Uuid) -> Self {
        Self {
            conn_id,
            queued_at: Instant::now(),
        }
    }
}

/// FIFO queue of connections waiting to be paired
pub struct WaitingQueue {
    queue: VecDeque<QueuedConnection>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Add a connection to the back of the queue. Re-joining moves the
    /// connection to the back rather than duplicating it.
    pub fn enqueue(&mut self, conn_id: Uuid) {
        self.queue.retain(|q| q.conn_id != conn_id);
        self.queue.push_back(QueuedConnection::new(conn_id));
    }

    /// Remove a connection from the queue
    pub fn remove(&mut self, conn_id: Uuid) -> Option<QueuedConnection> {
        let pos = self.queue.iter().position(|q| q.conn_id == conn_id)?;
        self.queue.remove(pos)
    }

    /// Check if a connection is queued
    pub fn contains(&self, conn_id: &Uuid) -> bool {
        self.queue.iter().any(|q| &q.conn_id == conn_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the two longest-waiting connections, or None while fewer than
    /// two are queued.
    pub fn take_pair(&mut self) -> Option<[QueuedConnection; 2]> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some([first, second])
    }
}

impl Default for WaitingQueue {
    fn default() -> Self {
        Self::new()
    }
}
