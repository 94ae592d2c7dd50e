//! Types shared between the game server and the native client:
//! the JSON wire protocol and the angle math both sides agree on.

pub mod angles;
pub mod protocol;

pub use protocol::{
    ClientMsg, EndReason, PlayerSnapshot, RosterEntry, ServerMsg, TankAssignment, TankLoadout,
};
