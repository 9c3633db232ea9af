//! Application state shared across routes

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::config::Config;
use crate::game::{GameVariant, SessionRegistry};
use crate::gesture::{GestureExtractor, PalmZoneExtractor};
use crate::store::GameStatsStore;

/// How often idle sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub voice_sessions: Arc<SessionRegistry>,
    pub gesture_sessions: Arc<SessionRegistry>,
    pub gestures: Arc<dyn GestureExtractor>,
    pub stats: Arc<GameStatsStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_extractor(config, Arc::new(PalmZoneExtractor::default()))
    }

    pub fn with_extractor(config: Config, gestures: Arc<dyn GestureExtractor>) -> Self {
        Self {
            config: Arc::new(config),
            voice_sessions: Arc::new(SessionRegistry::for_variant(GameVariant::Voice)),
            gesture_sessions: Arc::new(SessionRegistry::for_variant(GameVariant::Gesture)),
            gestures,
            stats: Arc::new(GameStatsStore::new()),
        }
    }

    /// Registry owning the sessions of `variant`
    pub fn sessions(&self, variant: GameVariant) -> &Arc<SessionRegistry> {
        match variant {
            GameVariant::Voice => &self.voice_sessions,
            GameVariant::Gesture => &self.gesture_sessions,
        }
    }

    /// Background sweep dropping sessions nobody connected to in time
    pub fn spawn_session_reaper(&self) -> JoinHandle<()> {
        let registries = [self.voice_sessions.clone(), self.gesture_sessions.clone()];
        let ttl = self.config.session_idle_ttl;

        tokio::spawn(async move {
            let mut ticker = interval(SESSION_SWEEP_INTERVAL.min(ttl));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let reaped: usize = registries.iter().map(|r| r.reap_idle(ttl)).sum();
                debug!(reaped, "Session sweep finished");
            }
        })
    }
}
