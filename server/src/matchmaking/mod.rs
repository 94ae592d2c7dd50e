//! Matchmaking - waiting queue and match lifecycle

pub mod queue;
pub mod service;

pub use service::{ConnectionHandle, MatchmakingService};
