//! Full-state snapshots pushed to the client

use serde::{Deserialize, Serialize};

use super::entities::{Avatar, Obstacle, ObstacleKind, PlayArea};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarView {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleView {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Self-contained engine state as seen by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub avatar: AvatarView,
    pub obstacles: Vec<ObstacleView>,
    pub score: u32,
    pub game_over: bool,
    pub game_started: bool,
    /// Rounded to one decimal for display
    pub difficulty_multiplier: f32,
    pub canvas_width: f32,
    pub canvas_height: f32,
}

impl GameSnapshot {
    pub fn capture(
        avatar: &Avatar,
        obstacles: &[Obstacle],
        score: u32,
        game_started: bool,
        game_over: bool,
        difficulty_multiplier: f32,
        area: &PlayArea,
    ) -> Self {
        Self {
            avatar: AvatarView {
                x: avatar.x,
                y: avatar.y,
                width: avatar.width,
                height: avatar.height,
            },
            obstacles: obstacles
                .iter()
                .map(|o| ObstacleView {
                    id: o.id,
                    kind: o.kind,
                    x: o.x,
                    y: o.y,
                    width: o.width,
                    height: o.height,
                })
                .collect(),
            score,
            game_over,
            game_started,
            difficulty_multiplier: (difficulty_multiplier * 10.0).round() / 10.0,
            canvas_width: area.width,
            canvas_height: area.height,
        }
    }
}
