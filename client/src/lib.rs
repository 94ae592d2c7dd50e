//! Tank Arena client.
//!
//! A native viewer for the arena server. It joins the matchmaking queue over
//! a WebSocket, streams authoritative snapshots, and renders the match a
//! fixed delay behind the server clock so motion stays smooth between ticks.
//! All simulation happens server-side; the client only reports intent.

pub mod input;
pub mod net;
pub mod render;
pub mod state;
