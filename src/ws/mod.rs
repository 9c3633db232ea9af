//! Real-time game channel

pub mod handler;
pub mod protocol;
pub mod session;
