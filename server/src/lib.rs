//! Tank Arena Server - authoritative 1v1 arena game server
//!
//! The server owns all match state. It handles:
//! - WebSocket connections carrying queue and in-match messages
//! - FIFO matchmaking over connected sockets
//! - Fixed-tickrate match simulation (movement, collision, ram damage)
//! - Cookie-session auth over a file-backed user store

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod store;
pub mod util;
pub mod ws;
