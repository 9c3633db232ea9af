//! Game simulation modules

pub mod engine;
pub mod entities;
pub mod physics;
pub mod registry;
pub mod snapshot;
pub mod tuning;

pub use entities::Direction;
pub use registry::{ConnectionId, SessionId, SessionRegistry, SharedEngine};
pub use snapshot::GameSnapshot;
pub use tuning::GameVariant;

/// Things that happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Spawned { obstacle_id: u64 },
    Cleared { obstacle_id: u64, score: u32 },
    DifficultyRaised { multiplier: f32 },
    Collision { obstacle_id: u64, final_score: u32 },
}
