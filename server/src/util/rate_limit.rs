//! Per-connection flood protection for the socket read path

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Messages per second allowed on one socket. Aim updates alone can
/// legitimately run at ~60/s, so this only catches floods.
pub const SOCKET_RATE_LIMIT: u32 = 120;

/// Limiter state for one WebSocket connection.
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    msg_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(SOCKET_RATE_LIMIT)
    }

    fn with_rate(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            msg_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// True when the message is within budget.
    pub fn check_message(&self) -> bool {
        self.msg_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
