//! Keyboard and mouse intent tracking.
//!
//! Movement is sent only when the pressed key set changes; aim is throttled
//! so mouse motion does not flood the socket.

use shared::angles::angle_delta;
use shared::protocol::ClientMsg;

/// Minimum aim change worth reporting, radians.
const AIM_EPSILON: f32 = 0.02;
/// Fastest interval between aim sends, milliseconds.
const AIM_MIN_INTERVAL_MS: f64 = 16.0;
/// An unchanged aim is still refreshed this often, milliseconds.
const AIM_REFRESH_INTERVAL_MS: f64 = 150.0;

/// Current movement key state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MoveKeys {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
}

/// Decides which input frames are worth sending.
#[derive(Debug)]
pub struct InputTracker {
    keys: MoveKeys,
    last_aim: f32,
    last_aim_sent_ms: f64,
}

impl Default for InputTracker {
    fn default() -> Self {
        Self {
            keys: MoveKeys::default(),
            last_aim: 0.0,
            last_aim_sent_ms: f64::NEG_INFINITY,
        }
    }
}

impl InputTracker {
    /// Returns an input message when the pressed key set changed.
    pub fn movement(&mut self, keys: MoveKeys) -> Option<ClientMsg> {
        if keys == self.keys {
            return None;
        }
        self.keys = keys;
        Some(ClientMsg::Input {
            w: keys.w,
            a: keys.a,
            s: keys.s,
            d: keys.d,
        })
    }

    /// Returns an aim message when the angle moved enough, or periodically as
    /// a refresh even while the mouse is still.
    pub fn aim(&mut self, angle: f32, now_ms: f64) -> Option<ClientMsg> {
        let elapsed = now_ms - self.last_aim_sent_ms;
        let moved = angle_delta(self.last_aim, angle).abs() > AIM_EPSILON;
        if (moved && elapsed > AIM_MIN_INTERVAL_MS) || elapsed > AIM_REFRESH_INTERVAL_MS {
            self.last_aim = angle;
            self.last_aim_sent_ms = now_ms;
            return Some(ClientMsg::Aim { angle });
        }
        None
    }

    /// Forgets held keys so the next match starts from all-released.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
