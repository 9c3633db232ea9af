//! Authoritative per-session simulation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::entities::{Avatar, Direction, Obstacle};
use super::physics::PhysicsSystem;
use super::snapshot::GameSnapshot;
use super::tuning::VariantConfig;
use super::GameEvent;

/// Lifecycle of one game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Created, waiting for the first start
    NotStarted,
    /// Accepting commands and ticks
    Running,
    /// Collided; only a start leaves this state
    Over,
}

/// One session's game state. All operations are infallible.
pub struct GameEngine {
    config: Arc<VariantConfig>,
    avatar: Avatar,
    obstacles: Vec<Obstacle>,
    score: u32,
    game_started: bool,
    game_over: bool,
    difficulty_multiplier: f32,
    spawn_interval: Duration,
    last_spawn: Instant,
    started_at: Option<Instant>,
    next_obstacle_id: u64,
    rng: ChaCha8Rng,
}

impl GameEngine {
    pub fn new(config: Arc<VariantConfig>) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Engine with a fixed RNG seed; identical inputs give identical games
    pub fn with_seed(config: Arc<VariantConfig>, seed: u64) -> Self {
        let avatar = Self::fresh_avatar(&config);
        let spawn_interval = config.spawn_interval;
        Self {
            config,
            avatar,
            obstacles: Vec::new(),
            score: 0,
            game_started: false,
            game_over: false,
            difficulty_multiplier: 1.0,
            spawn_interval,
            last_spawn: Instant::now(),
            started_at: None,
            next_obstacle_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn fresh_avatar(config: &VariantConfig) -> Avatar {
        let tuning = &config.avatar;
        Avatar::new(
            tuning.start_x,
            tuning.start_y,
            tuning.width,
            tuning.height,
            tuning.speed,
            &config.area,
        )
    }

    pub fn phase(&self) -> GamePhase {
        match (self.game_started, self.game_over) {
            (false, _) => GamePhase::NotStarted,
            (true, false) => GamePhase::Running,
            (true, true) => GamePhase::Over,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase() == GamePhase::Running
    }

    #[cfg(test)]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Start or restart; both reset everything
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.reset(now);
        self.game_started = true;
        self.game_over = false;
        self.started_at = Some(now);
        info!(variant = %self.config.variant, "Game started");
    }

    fn reset(&mut self, now: Instant) {
        self.avatar = Self::fresh_avatar(&self.config);
        self.obstacles.clear();
        self.score = 0;
        self.difficulty_multiplier = 1.0;
        self.spawn_interval = self.config.spawn_interval;
        self.last_spawn = now;
    }

    /// Apply a command token. Returns whether the avatar moved.
    pub fn apply_command(&mut self, command: &str) -> bool {
        if !self.is_running() {
            debug!(command, phase = ?self.phase(), "Ignoring command outside running game");
            return false;
        }

        match Direction::parse(command, self.config.command_phrases) {
            Some(direction) => self.apply_direction(direction),
            None => {
                warn!(command, "Unknown command");
                false
            }
        }
    }

    /// Move one step. Re-applied on every call, so a held input keeps moving.
    pub fn apply_direction(&mut self, direction: Direction) -> bool {
        if !self.is_running() {
            return false;
        }

        self.avatar.step(direction, &self.config.area);
        debug!(
            direction = direction.as_str(),
            x = self.avatar.x,
            y = self.avatar.y,
            "Avatar moved"
        );
        true
    }

    pub fn tick(&mut self) -> Vec<GameEvent> {
        self.tick_at(Instant::now())
    }

    /// Advance one frame at time `now`: spawn gate, then move, collide and
    /// clear obstacles in order. A collision ends the frame immediately.
    pub fn tick_at(&mut self, now: Instant) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.is_running() {
            return events;
        }

        if self.spawn_due(now) {
            let obstacle_id = self.spawn_obstacle();
            self.last_spawn = now;
            events.push(GameEvent::Spawned { obstacle_id });
        }

        let hitbox = PhysicsSystem::avatar_hitbox(&self.avatar, self.config.collision_padding);

        let mut idx = 0;
        while idx < self.obstacles.len() {
            let obstacle = &mut self.obstacles[idx];
            obstacle.advance();

            if PhysicsSystem::hits(&hitbox, obstacle) {
                let obstacle = self.obstacles.remove(idx);
                self.game_over = true;
                debug!(
                    variant = %self.config.variant,
                    obstacle_id = obstacle.id,
                    kind = ?obstacle.kind,
                    score = self.score,
                    "Collision, game over"
                );
                events.push(GameEvent::Collision {
                    obstacle_id: obstacle.id,
                    final_score: self.score,
                });
                return events;
            }

            if obstacle.is_off_screen() {
                let obstacle = self.obstacles.remove(idx);
                self.award(obstacle.id, &mut events);
                continue;
            }

            idx += 1;
        }

        events
    }

    fn spawn_due(&self, now: Instant) -> bool {
        let interval_elapsed =
            now.saturating_duration_since(self.last_spawn) >= self.spawn_interval;
        let grace_elapsed = self
            .started_at
            .map_or(true, |start| now.saturating_duration_since(start) >= self.config.spawn_grace);
        interval_elapsed && grace_elapsed
    }

    /// Ids keep counting across restarts so they stay unique within the session
    fn spawn_obstacle(&mut self) -> u64 {
        let pick = self.rng.gen_range(0..self.config.obstacles.len());
        let template = self.config.obstacles[pick];

        let low = self.config.spawn_margin_top;
        let high = (self.config.area.height - template.height - self.config.spawn_margin_bottom)
            .max(low);
        let y = self.rng.gen_range(low..=high);

        let id = self.next_obstacle_id;
        self.next_obstacle_id += 1;

        let obstacle = Obstacle {
            id,
            kind: template.kind,
            x: self.config.area.width + self.config.spawn_offset_x,
            y,
            width: template.width,
            height: template.height,
            speed: self.config.obstacle_base_speed * self.difficulty_multiplier,
        };
        debug!(
            obstacle_id = id,
            kind = ?obstacle.kind,
            y,
            speed = obstacle.speed,
            "Spawned obstacle"
        );
        self.obstacles.push(obstacle);
        id
    }

    fn award(&mut self, obstacle_id: u64, events: &mut Vec<GameEvent>) {
        self.score += self.config.score_per_obstacle;
        events.push(GameEvent::Cleared {
            obstacle_id,
            score: self.score,
        });

        if self.score % self.config.difficulty_threshold == 0 {
            self.difficulty_multiplier = (self.difficulty_multiplier + self.config.difficulty_step)
                .min(self.config.difficulty_cap);
            self.spawn_interval = self
                .spawn_interval
                .saturating_sub(self.config.spawn_interval_step)
                .max(self.config.spawn_interval_floor);
            debug!(
                score = self.score,
                multiplier = self.difficulty_multiplier,
                spawn_interval_ms = self.spawn_interval.as_millis() as u64,
                "Difficulty increased"
            );
            events.push(GameEvent::DifficultyRaised {
                multiplier: self.difficulty_multiplier,
            });
        }
    }

    /// Pure read of the full state
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(
            &self.avatar,
            &self.obstacles,
            self.score,
            self.game_started,
            self.game_over,
            self.difficulty_multiplier,
            &self.config.area,
        )
    }
}
