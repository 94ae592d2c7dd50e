//! Application state shared across routes

use std::sync::Arc;

use glam::Vec2;

use crate::config::Config;
use crate::matchmaking::MatchmakingService;
use crate::store::{SessionStore, UserStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub matchmaking: MatchmakingService,
    pub users: UserStore,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Accounts live under DATA_DIR/users
        let users = UserStore::new(config.data_dir.join("users"));
        let sessions = SessionStore::new();

        let bounds = Vec2::new(config.arena_width, config.arena_height);
        let matchmaking = MatchmakingService::new(bounds, users.clone());

        Self {
            config,
            matchmaking,
            users,
            sessions,
        }
    }
}
