//! HTTP surface: health, session creation, WebSocket upgrade

pub mod middleware;
pub mod routes;

pub use routes::build_router;
