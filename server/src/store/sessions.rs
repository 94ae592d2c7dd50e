//! In-memory session tokens

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Maps session ID -> username. Sessions live until logout or
/// server restart.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a session for a logged-in user.
    pub fn create(&self, username: &str) -> Uuid {
        let sid = Uuid::new_v4();
        self.sessions.insert(sid, username.to_string());
        sid
    }

    pub fn lookup(&self, sid: Uuid) -> Option<String> {
        self.sessions.get(&sid).map(|entry| entry.value().clone())
    }

    /// Drop a session, returning the username it belonged to.
    pub fn revoke(&self, sid: Uuid) -> Option<String> {
        self.sessions.remove(&sid).map(|(_, username)| username)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
