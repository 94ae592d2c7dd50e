//! Persistence - user accounts on disk, sessions in memory

pub mod sessions;
pub mod users;

pub use sessions::SessionStore;
pub use users::{StoreError, UserStore};
