//! Per-variant tuning tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::entities::{ObstacleKind, PlayArea};

/// Game variants served by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Discrete spoken commands, one step per command
    Voice,
    /// Continuous hand gestures, one step per labelled frame
    Gesture,
}

impl GameVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameVariant::Voice => "voice",
            GameVariant::Gesture => "gesture",
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Obstacle template the spawn policy picks from
#[derive(Debug, Clone, Copy)]
pub struct ObstacleTemplate {
    pub kind: ObstacleKind,
    pub width: f32,
    pub height: f32,
}

impl ObstacleTemplate {
    const fn new(kind: ObstacleKind, width: f32, height: f32) -> Self {
        Self { kind, width, height }
    }
}

/// Avatar geometry and step size
#[derive(Debug, Clone, Copy)]
pub struct AvatarTuning {
    pub start_x: f32,
    pub start_y: f32,
    pub width: f32,
    pub height: f32,
    /// Pixels moved per directional command
    pub speed: f32,
}

/// Complete tuning table for one variant
#[derive(Debug, Clone)]
pub struct VariantConfig {
    pub variant: GameVariant,
    pub area: PlayArea,
    pub avatar: AvatarTuning,
    pub obstacles: Vec<ObstacleTemplate>,
    /// Obstacle speed at multiplier 1.0 (pixels per tick)
    pub obstacle_base_speed: f32,
    /// Spawn x is `canvas_width + spawn_offset_x`
    pub spawn_offset_x: f32,
    /// Vertical spawn band is `[spawn_margin_top, height - obstacle - spawn_margin_bottom]`
    pub spawn_margin_top: f32,
    pub spawn_margin_bottom: f32,
    /// Shrinks the avatar hitbox on every side
    pub collision_padding: f32,
    pub spawn_interval: Duration,
    pub spawn_interval_floor: Duration,
    pub spawn_interval_step: Duration,
    /// No spawns until this much time has passed since start
    pub spawn_grace: Duration,
    pub score_per_obstacle: u32,
    pub difficulty_threshold: u32,
    pub difficulty_step: f32,
    pub difficulty_cap: f32,
    /// Accept "move up" / "go up" phrasing in addition to bare directions
    pub command_phrases: bool,
    /// Whether `frame` messages are routed to the gesture extractor
    pub accepts_frames: bool,
}

impl VariantConfig {
    pub fn for_variant(variant: GameVariant) -> Self {
        match variant {
            GameVariant::Voice => Self::voice(),
            GameVariant::Gesture => Self::gesture(),
        }
    }

    fn voice() -> Self {
        Self {
            variant: GameVariant::Voice,
            area: PlayArea::new(800.0, 500.0),
            avatar: AvatarTuning {
                start_x: 50.0,
                start_y: 250.0,
                width: 60.0,
                height: 40.0,
                speed: 15.0,
            },
            obstacles: vec![
                ObstacleTemplate::new(ObstacleKind::Cloud, 40.0, 40.0),
                ObstacleTemplate::new(ObstacleKind::Bird, 40.0, 40.0),
                ObstacleTemplate::new(ObstacleKind::Mountain, 40.0, 40.0),
            ],
            obstacle_base_speed: 5.0,
            spawn_offset_x: 0.0,
            spawn_margin_top: 50.0,
            spawn_margin_bottom: 50.0,
            collision_padding: 5.0,
            spawn_interval: Duration::from_millis(1500),
            spawn_interval_floor: Duration::from_millis(800),
            spawn_interval_step: Duration::from_millis(100),
            spawn_grace: Duration::ZERO,
            score_per_obstacle: 10,
            difficulty_threshold: 100,
            difficulty_step: 0.1,
            difficulty_cap: 2.0,
            command_phrases: true,
            accepts_frames: false,
        }
    }

    fn gesture() -> Self {
        Self {
            variant: GameVariant::Gesture,
            area: PlayArea::new(800.0, 500.0).with_margins(20.0, 20.0, 30.0, 30.0),
            avatar: AvatarTuning {
                start_x: 100.0,
                start_y: 250.0,
                width: 80.0,
                height: 35.0,
                speed: 25.0,
            },
            obstacles: vec![
                ObstacleTemplate::new(ObstacleKind::Bird, 50.0, 40.0),
                ObstacleTemplate::new(ObstacleKind::Cloud, 60.0, 40.0),
                ObstacleTemplate::new(ObstacleKind::Thunder, 30.0, 70.0),
                ObstacleTemplate::new(ObstacleKind::Ufo, 50.0, 40.0),
            ],
            obstacle_base_speed: 3.5,
            spawn_offset_x: 20.0,
            spawn_margin_top: 60.0,
            spawn_margin_bottom: 60.0,
            collision_padding: 15.0,
            spawn_interval: Duration::from_millis(2000),
            spawn_interval_floor: Duration::from_millis(1000),
            spawn_interval_step: Duration::from_millis(100),
            spawn_grace: Duration::from_millis(1500),
            score_per_obstacle: 10,
            difficulty_threshold: 100,
            difficulty_step: 0.1,
            difficulty_cap: 2.0,
            command_phrases: false,
            accepts_frames: true,
        }
    }
}
