//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::rate_limit::INBOUND_RATE_LIMIT;
use crate::util::time::DEFAULT_TICK_RATE;

/// Default lifetime of a session nobody has connected to
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u32 = 300;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the human format
    pub log_json: bool,

    /// HS256 secret shared with the auth provider
    pub jwt_secret: String,

    /// Public base URL used to build WebSocket addresses
    pub public_base_url: String,
    /// Allowed client origin(s) for CORS, comma-separated
    pub client_origin: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Inbound WebSocket messages allowed per second per connection
    pub inbound_rate_limit: u32,
    /// Sessions with no live connection are dropped after this long
    pub session_idle_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: matches!(env::var("LOG_FORMAT").as_deref(), Ok("json")),

            jwt_secret: env::var("AUTH_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?,

            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            tick_rate: parse_positive("TICK_RATE", DEFAULT_TICK_RATE)?,
            inbound_rate_limit: parse_positive("INBOUND_RATE_LIMIT", INBOUND_RATE_LIMIT)?,
            session_idle_ttl: Duration::from_secs(u64::from(parse_positive(
                "SESSION_IDLE_TTL_SECS",
                DEFAULT_SESSION_IDLE_TTL_SECS,
            )?)),
        })
    }

    /// `ws://` / `wss://` form of the public base URL
    pub fn websocket_base_url(&self) -> String {
        self.public_base_url
            .trim_end_matches('/')
            .replace("https://", "wss://")
            .replace("http://", "ws://")
    }
}

fn parse_positive(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid(key)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "debug".to_string(),
        log_json: false,
        jwt_secret: "test-secret".to_string(),
        public_base_url: "https://games.example.com/".to_string(),
        client_origin: "http://localhost:5173".to_string(),
        tick_rate: DEFAULT_TICK_RATE,
        inbound_rate_limit: INBOUND_RATE_LIMIT,
        session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS as u64),
    }
}
