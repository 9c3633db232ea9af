//! Collision checks between the avatar and obstacles

use super::entities::{Avatar, BoundingBox, Obstacle};

/// Stateless collision helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Two boxes collide iff they overlap on both axes (touching edges count)
    pub fn check_collision(a: &BoundingBox, b: &BoundingBox) -> bool {
        !(a.x2 < b.x1 || b.x2 < a.x1 || a.y2 < b.y1 || b.y2 < a.y1)
    }

    /// Avatar box shrunk by the forgiveness padding. The obstacle box is never padded.
    pub fn avatar_hitbox(avatar: &Avatar, padding: f32) -> BoundingBox {
        avatar.bounding_box().shrink(padding)
    }

    pub fn hits(hitbox: &BoundingBox, obstacle: &Obstacle) -> bool {
        Self::check_collision(hitbox, &obstacle.bounding_box())
    }
}
