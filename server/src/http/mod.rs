//! HTTP API - auth endpoints, health, WebSocket upgrade

pub mod auth;
pub mod routes;

pub use routes::build_router;
