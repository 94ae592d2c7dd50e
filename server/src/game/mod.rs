//! Game simulation modules

pub mod arena;
pub mod geometry;
pub mod tanks;

pub use arena::{ArenaMatch, MatchHandle, MatchOutcome, Participant};

use glam::Vec2;
use shared::protocol::ClientMsg;
use uuid::Uuid;

/// Connection event routed into a match
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub conn_id: Uuid,
    pub kind: PlayerEventKind,
}

#[derive(Debug, Clone)]
pub enum PlayerEventKind {
    /// A parsed message from this participant's socket
    Msg(ClientMsg),
    /// The participant's socket closed
    Disconnected,
}

/// Held movement keys for one tank
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveState {
    pub up: bool,
    pub left: bool,
    pub down: bool,
    pub right: bool,
}

impl MoveState {
    /// Movement direction with diagonals normalized to unit length.
    /// Zero when no keys are held.
    pub fn direction(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.up {
            dir.y -= 1.0;
        }
        if self.down {
            dir.y += 1.0;
        }
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        if dir != Vec2::ZERO {
            dir = dir.normalize();
        }
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonals_are_unit_length() {
        let state = MoveState {
            up: true,
            right: true,
            ..Default::default()
        };
        let dir = state.direction();
        assert!((dir.length() - 1.0).abs() < 1e-6);
        assert!(dir.x > 0.0 && dir.y < 0.0);
    }

    #[test]
    fn opposing_keys_cancel() {
        let state = MoveState {
            up: true,
            down: true,
            left: true,
            right: true,
        };
        assert_eq!(state.direction(), Vec2::ZERO);
    }
}
