//! Avatar and obstacle value types

use serde::{Deserialize, Serialize};

/// Axis-aligned box as `(x1, y1, x2, y2)`, origin top-left, y grows downward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// Shrink by `padding` on all four sides
    pub fn shrink(self, padding: f32) -> Self {
        Self {
            x1: self.x1 + padding,
            y1: self.y1 + padding,
            x2: self.x2 - padding,
            y2: self.y2 - padding,
        }
    }
}

/// Movement direction accepted from either input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    #[cfg(test)]
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Parse a command token. With `phrases`, "move up" and "go up" are accepted too.
    pub fn parse(command: &str, phrases: bool) -> Option<Self> {
        let command = command.trim().to_lowercase();
        let token = if phrases {
            command
                .strip_prefix("move ")
                .or_else(|| command.strip_prefix("go "))
                .map(str::trim)
                .unwrap_or(&command)
        } else {
            command.as_str()
        };

        match token {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Canvas size plus the margins the avatar must stay inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayArea {
    pub width: f32,
    pub height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PlayArea {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            margin_bottom: 0.0,
        }
    }

    pub fn with_margins(mut self, left: f32, right: f32, top: f32, bottom: f32) -> Self {
        self.margin_left = left;
        self.margin_right = right;
        self.margin_top = top;
        self.margin_bottom = bottom;
        self
    }

    /// Clamp the left edge of a box of `width` so the whole box stays inside
    pub fn clamp_x(&self, x: f32, width: f32) -> f32 {
        let low = self.margin_left;
        let high = (self.width - self.margin_right - width).max(low);
        x.max(low).min(high)
    }

    /// Clamp the top edge of a box of `height` so the whole box stays inside
    pub fn clamp_y(&self, y: f32, height: f32) -> f32 {
        let low = self.margin_top;
        let high = (self.height - self.margin_bottom - height).max(low);
        y.max(low).min(high)
    }

    #[cfg(test)]
    pub fn contains(&self, bounds: &BoundingBox) -> bool {
        bounds.x1 >= self.margin_left
            && bounds.y1 >= self.margin_top
            && bounds.x2 <= self.width - self.margin_right
            && bounds.y2 <= self.height - self.margin_bottom
    }
}

/// The player-controlled airplane
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
}

impl Avatar {
    /// Create an avatar at `(x, y)`, clamped into `area`
    pub fn new(x: f32, y: f32, width: f32, height: f32, speed: f32, area: &PlayArea) -> Self {
        Self {
            x: area.clamp_x(x, width),
            y: area.clamp_y(y, height),
            width,
            height,
            speed,
        }
    }

    pub fn move_up(&mut self, area: &PlayArea) {
        self.y = area.clamp_y(self.y - self.speed, self.height);
    }

    pub fn move_down(&mut self, area: &PlayArea) {
        self.y = area.clamp_y(self.y + self.speed, self.height);
    }

    pub fn move_left(&mut self, area: &PlayArea) {
        self.x = area.clamp_x(self.x - self.speed, self.width);
    }

    pub fn move_right(&mut self, area: &PlayArea) {
        self.x = area.clamp_x(self.x + self.speed, self.width);
    }

    pub fn step(&mut self, direction: Direction, area: &PlayArea) {
        match direction {
            Direction::Up => self.move_up(area),
            Direction::Down => self.move_down(area),
            Direction::Left => self.move_left(area),
            Direction::Right => self.move_right(area),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

/// Cosmetic obstacle tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Cloud,
    Bird,
    Mountain,
    Thunder,
    Ufo,
}

/// Obstacle scrolling right to left
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: u64,
    pub kind: ObstacleKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Pixels per tick, already scaled by the difficulty multiplier
    pub speed: f32,
}

impl Obstacle {
    pub fn advance(&mut self) {
        self.x -= self.speed;
    }

    /// Right edge has passed x = 0
    pub fn is_off_screen(&self) -> bool {
        self.x + self.width < 0.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gesture_area() -> PlayArea {
        PlayArea::new(800.0, 500.0).with_margins(20.0, 20.0, 30.0, 30.0)
    }

    #[test]
    fn test_parse_bare_directions() {
        assert_eq!(Direction::parse("up", false), Some(Direction::Up));
        assert_eq!(Direction::parse("  DOWN ", false), Some(Direction::Down));
        assert_eq!(Direction::parse("move left", false), None);
        assert_eq!(Direction::parse("fly sideways", true), None);
    }

    #[test]
    fn test_parse_phrases() {
        assert_eq!(Direction::parse("move up", true), Some(Direction::Up));
        assert_eq!(Direction::parse("Go Right", true), Some(Direction::Right));
        assert_eq!(Direction::parse("go sideways", true), None);
    }

    #[test]
    fn test_moves_clamp_to_margins() {
        let area = gesture_area();
        let mut avatar = Avatar::new(100.0, 250.0, 80.0, 35.0, 25.0, &area);

        for _ in 0..50 {
            avatar.move_up(&area);
        }
        assert_eq!(avatar.y, 30.0);

        for _ in 0..50 {
            avatar.move_down(&area);
        }
        assert_eq!(avatar.y, 500.0 - 30.0 - 35.0);

        for _ in 0..50 {
            avatar.move_left(&area);
        }
        assert_eq!(avatar.x, 20.0);

        for _ in 0..50 {
            avatar.move_right(&area);
        }
        assert_eq!(avatar.x, 800.0 - 20.0 - 80.0);
    }

    #[test]
    fn test_box_stays_inside_for_mixed_moves() {
        let area = gesture_area();
        let mut avatar = Avatar::new(100.0, 250.0, 80.0, 35.0, 25.0, &area);
        // Deterministic but irregular walk
        let mut state: u32 = 7;
        for _ in 0..2_000 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let direction = Direction::ALL[(state >> 16) as usize % 4];
            avatar.step(direction, &area);
            assert!(area.contains(&avatar.bounding_box()), "escaped at {:?}", avatar);
        }
    }

    #[test]
    fn test_new_clamps_start_position() {
        let area = gesture_area();
        let avatar = Avatar::new(0.0, 1_000.0, 80.0, 35.0, 25.0, &area);
        assert_eq!(avatar.x, 20.0);
        assert_eq!(avatar.y, 435.0);
    }

    #[test]
    fn test_obstacle_leaves_only_after_right_edge_passes_zero() {
        let mut obstacle = Obstacle {
            id: 0,
            kind: ObstacleKind::Cloud,
            x: 5.0,
            y: 100.0,
            width: 40.0,
            height: 40.0,
            speed: 5.0,
        };
        for _ in 0..9 {
            obstacle.advance();
        }
        // right edge exactly at 0
        assert_eq!(obstacle.x + obstacle.width, 0.0);
        assert!(!obstacle.is_off_screen());
        obstacle.advance();
        assert!(obstacle.is_off_screen());
    }

    #[test]
    fn test_shrink_is_symmetric() {
        let bounds = BoundingBox::new(10.0, 20.0, 80.0, 35.0).shrink(15.0);
        assert_eq!(bounds, BoundingBox { x1: 25.0, y1: 35.0, x2: 75.0, y2: 40.0 });
    }
}
