//! Per-user game statistics

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::game::GameVariant;

/// Totals for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantStats {
    pub high_score: u32,
    pub total_games: u32,
    pub total_score: u64,
    /// Mean score, rounded to two decimals
    pub average_score: f64,
    pub last_played: Option<DateTime<Utc>>,
}

impl VariantStats {
    fn record(&mut self, score: u32, at: DateTime<Utc>) -> bool {
        let is_high_score = score > self.high_score;

        self.high_score = self.high_score.max(score);
        self.total_games += 1;
        self.total_score += u64::from(score);
        self.average_score =
            (self.total_score as f64 / f64::from(self.total_games) * 100.0).round() / 100.0;
        self.last_played = Some(at);

        is_high_score
    }
}

/// Statistics for both variants of one user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub voice: VariantStats,
    pub gesture: VariantStats,
}

impl UserStats {
    fn variant_mut(&mut self, variant: GameVariant) -> &mut VariantStats {
        match variant {
            GameVariant::Voice => &mut self.voice,
            GameVariant::Gesture => &mut self.gesture,
        }
    }
}

/// Result of submitting one finished game
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub is_high_score: bool,
    pub stats: VariantStats,
}

/// Game statistics keyed by user id. Lives for the process lifetime.
#[derive(Default)]
pub struct GameStatsStore {
    users: DashMap<Uuid, UserStats>,
}

impl GameStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished game
    pub fn record_score(&self, user_id: Uuid, variant: GameVariant, score: u32) -> ScoreOutcome {
        self.record_score_at(user_id, variant, score, Utc::now())
    }

    pub fn record_score_at(
        &self,
        user_id: Uuid,
        variant: GameVariant,
        score: u32,
        at: DateTime<Utc>,
    ) -> ScoreOutcome {
        let mut user = self.users.entry(user_id).or_default();
        let stats = user.variant_mut(variant);
        let is_high_score = stats.record(score, at);

        if is_high_score {
            info!(user_id = %user_id, variant = %variant, score, "New high score");
        }

        ScoreOutcome {
            is_high_score,
            stats: stats.clone(),
        }
    }

    /// Stats for a user; zeroes if they never played
    pub fn get_stats(&self, user_id: Uuid) -> UserStats {
        self.users
            .get(&user_id)
            .map(|user| user.clone())
            .unwrap_or_default()
    }
}
