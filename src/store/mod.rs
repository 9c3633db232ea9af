//! In-memory stores for per-user data

pub mod stats;

pub use stats::GameStatsStore;
