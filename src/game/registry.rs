//! Session id -> engine map for one game variant

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use super::engine::GameEngine;
use super::tuning::{GameVariant, VariantConfig};

pub type SessionId = Uuid;
pub type ConnectionId = u64;

/// Engine handle shared by a connection's reader and its tick loop.
/// The lock is never held across an await.
pub type SharedEngine = Arc<Mutex<GameEngine>>;

struct SessionSlot {
    engine: SharedEngine,
    owner: Option<Uuid>,
    connection: Option<ConnectionId>,
    created_at: DateTime<Utc>,
    /// Reaping clock; a slot that loses its connection is deleted outright
    idle_since: Instant,
}

/// Public view of a session entry
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub owner: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session {0} already has a live connection")]
    AlreadyConnected(SessionId),

    #[error("Session {0} was deleted while connecting")]
    Deleted(SessionId),
}

/// Registry of all sessions for one variant
pub struct SessionRegistry {
    config: Arc<VariantConfig>,
    sessions: DashMap<SessionId, SessionSlot>,
    next_connection: AtomicU64,
}

impl SessionRegistry {
    pub fn new(config: VariantConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: DashMap::new(),
            next_connection: AtomicU64::new(1),
        }
    }

    pub fn for_variant(variant: GameVariant) -> Self {
        Self::new(VariantConfig::for_variant(variant))
    }

    pub fn variant(&self) -> GameVariant {
        self.config.variant
    }

    pub fn config(&self) -> &Arc<VariantConfig> {
        &self.config
    }

    fn new_slot(&self, owner: Option<Uuid>) -> SessionSlot {
        SessionSlot {
            engine: Arc::new(Mutex::new(GameEngine::new(self.config.clone()))),
            owner,
            connection: None,
            created_at: Utc::now(),
            idle_since: Instant::now(),
        }
    }

    /// Existing engine for `session_id`, or a fresh idle one. Creation is
    /// atomic per key, so concurrent callers always share one engine.
    pub fn get(&self, session_id: &SessionId) -> SharedEngine {
        self.sessions
            .entry(*session_id)
            .or_insert_with(|| {
                debug!(session_id = %session_id, variant = %self.variant(), "Creating session");
                self.new_slot(None)
            })
            .engine
            .clone()
    }

    /// Allocate a new session for an authenticated caller
    pub fn open(&self, owner: Uuid) -> SessionInfo {
        let session_id = Uuid::new_v4();
        let slot = self.new_slot(Some(owner));
        let info = SessionInfo {
            session_id,
            owner: slot.owner,
            created_at: slot.created_at,
        };
        self.sessions.insert(session_id, slot);

        info!(
            session_id = %session_id,
            user_id = %owner,
            variant = %self.variant(),
            "Session created"
        );
        info
    }

    pub fn info(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|slot| SessionInfo {
            session_id: *session_id,
            owner: slot.owner,
            created_at: slot.created_at,
        })
    }

    /// Remove a session if present. Idempotent.
    pub fn delete(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, variant = %self.variant(), "Session deleted");
        }
        removed
    }

    /// Bind a new live connection to the session, creating it if needed
    pub fn attach(
        &self,
        session_id: &SessionId,
    ) -> Result<(ConnectionId, SharedEngine), RegistryError> {
        let engine = self.get(session_id);
        let connection_id = self.next_connection.fetch_add(1, Ordering::Relaxed);

        let mut slot = self
            .sessions
            .get_mut(session_id)
            .filter(|slot| Arc::ptr_eq(&slot.engine, &engine))
            .ok_or(RegistryError::Deleted(*session_id))?;

        if slot.connection.is_some() {
            return Err(RegistryError::AlreadyConnected(*session_id));
        }
        slot.connection = Some(connection_id);

        Ok((connection_id, engine))
    }

    /// Whether `connection_id` is still the live connection of the session
    pub fn is_attached(&self, session_id: &SessionId, connection_id: ConnectionId) -> bool {
        self.sessions
            .get(session_id)
            .map_or(false, |slot| slot.connection == Some(connection_id))
    }

    pub fn is_connected(&self, session_id: &SessionId) -> bool {
        self.sessions
            .get(session_id)
            .map_or(false, |slot| slot.connection.is_some())
    }

    /// Connection teardown: delete the session together with its engine.
    /// Only the connection that owns the session may release it. An
    /// attached slot is never reaped or re-attached, so the check holds
    /// until the delete.
    pub fn release(&self, session_id: &SessionId, connection_id: ConnectionId) -> bool {
        if !self.is_attached(session_id, connection_id) {
            debug!(session_id = %session_id, connection_id, "Release by stale connection ignored");
            return false;
        }
        self.delete(session_id)
    }

    /// Drop sessions that have had no live connection for at least `ttl`.
    /// Returns how many were removed.
    pub fn reap_idle(&self, ttl: Duration) -> usize {
        self.reap_idle_at(Instant::now(), ttl)
    }

    pub fn reap_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| {
            slot.connection.is_some() || now.saturating_duration_since(slot.idle_since) < ttl
        });
        let reaped = before.saturating_sub(self.sessions.len());
        if reaped > 0 {
            info!(variant = %self.variant(), reaped, "Reaped idle sessions");
        }
        reaped
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn connection_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().connection.is_some())
            .count()
    }
}
