//! Gesture extraction boundary
//!
//! Turning camera frames into hand positions happens outside this server.
//! Frames arrive as opaque tokens; an extractor maps each token to a
//! direction label once per `frame` message.

use serde::{Deserialize, Serialize};

use crate::game::Direction;

/// Direction label produced for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureLabel {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

impl GestureLabel {
    pub fn direction(self) -> Option<Direction> {
        match self {
            GestureLabel::Up => Some(Direction::Up),
            GestureLabel::Down => Some(Direction::Down),
            GestureLabel::Left => Some(Direction::Left),
            GestureLabel::Right => Some(Direction::Right),
            GestureLabel::None => None,
        }
    }
}

impl From<Direction> for GestureLabel {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => GestureLabel::Up,
            Direction::Down => GestureLabel::Down,
            Direction::Left => GestureLabel::Left,
            Direction::Right => GestureLabel::Right,
        }
    }
}

/// Result of examining one frame
#[derive(Debug, Clone, PartialEq)]
pub struct GestureReading {
    pub label: GestureLabel,
    pub hand_detected: bool,
    /// Annotated frame to echo back for display, if the backend renders one
    pub annotated_frame: Option<String>,
    pub description: String,
}

impl GestureReading {
    pub fn no_hand(description: impl Into<String>) -> Self {
        Self {
            label: GestureLabel::None,
            hand_detected: false,
            annotated_frame: None,
            description: description.into(),
        }
    }
}

/// Maps a frame token to a direction label
pub trait GestureExtractor: Send + Sync {
    fn extract(&self, frame: &str) -> GestureReading;
}

/// Classifies a normalised palm point `"x,y"` (optionally `palm:x,y`) by
/// which zone of the frame it sits in. Vertical offsets take priority.
#[derive(Debug, Clone, Copy)]
pub struct PalmZoneExtractor {
    threshold: f32,
}

impl PalmZoneExtractor {
    /// Offset from centre, as a fraction of the frame, that counts as a gesture
    pub const DEFAULT_THRESHOLD: f32 = 0.15;

    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, palm_x: f32, palm_y: f32) -> GestureLabel {
        let dx = palm_x - 0.5;
        let dy = palm_y - 0.5;

        if dy < -self.threshold {
            GestureLabel::Up
        } else if dy > self.threshold {
            GestureLabel::Down
        } else if dx < -self.threshold {
            GestureLabel::Left
        } else if dx > self.threshold {
            GestureLabel::Right
        } else {
            GestureLabel::None
        }
    }

    fn parse_point(frame: &str) -> Option<(f32, f32)> {
        let raw = frame.trim();
        let raw = raw.strip_prefix("palm:").unwrap_or(raw);
        let (x, y) = raw.split_once(',')?;
        let x: f32 = x.trim().parse().ok()?;
        let y: f32 = y.trim().parse().ok()?;

        let valid = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        (valid(x) && valid(y)).then_some((x, y))
    }
}

impl Default for PalmZoneExtractor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl GestureExtractor for PalmZoneExtractor {
    fn extract(&self, frame: &str) -> GestureReading {
        let Some((x, y)) = Self::parse_point(frame) else {
            return GestureReading::no_hand("No hand detected");
        };

        let label = self.classify(x, y);
        let zone = match label {
            GestureLabel::None => "CENTER".to_string(),
            other => format!("{:?}", other).to_uppercase(),
        };

        GestureReading {
            label,
            hand_detected: true,
            annotated_frame: None,
            description: format!("{} - hand at ({:.2}, {:.2})", zone, x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_zones() {
        let extractor = PalmZoneExtractor::default();

        assert_eq!(extractor.classify(0.5, 0.2), GestureLabel::Up);
        assert_eq!(extractor.classify(0.5, 0.8), GestureLabel::Down);
        assert_eq!(extractor.classify(0.1, 0.5), GestureLabel::Left);
        assert_eq!(extractor.classify(0.9, 0.5), GestureLabel::Right);
        assert_eq!(extractor.classify(0.55, 0.45), GestureLabel::None);
    }

    #[test]
    fn test_vertical_wins_over_horizontal() {
        let extractor = PalmZoneExtractor::default();
        assert_eq!(extractor.classify(0.95, 0.05), GestureLabel::Up);
        assert_eq!(extractor.classify(0.05, 0.95), GestureLabel::Down);
    }

    #[test]
    fn test_extract_parses_tokens() {
        let extractor = PalmZoneExtractor::default();

        let reading = extractor.extract("palm:0.50,0.10");
        assert_eq!(reading.label, GestureLabel::Up);
        assert!(reading.hand_detected);
        assert_eq!(reading.description, "UP - hand at (0.50, 0.10)");

        assert_eq!(extractor.extract(" 0.9 , 0.5 ").label, GestureLabel::Right);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let extractor = PalmZoneExtractor::default();

        for token in ["", "data:image/jpeg;base64,AAAA", "1.5,0.5", "NaN,0.5", "0.5"] {
            let reading = extractor.extract(token);
            assert_eq!(reading.label, GestureLabel::None, "token {token:?}");
            assert!(!reading.hand_detected);
        }
    }

    #[test]
    fn test_label_round_trips_direction() {
        for direction in Direction::ALL {
            assert_eq!(GestureLabel::from(direction).direction(), Some(direction));
        }
        assert_eq!(GestureLabel::None.direction(), None);
    }
}
