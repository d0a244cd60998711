//! Server configuration and shared application state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenVerifier;
use crate::notify::NotificationBroker;
use crate::store::ChatStore;
use crate::users::UserDirectory;

/// Configuration for the ChatMe server, read from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_addr: SocketAddr,
    /// Shared secret for signing and verifying credentials
    pub token_secret: String,
    /// Credential lifetime in days
    pub token_ttl_days: i64,
    /// Interval between heartbeat events on open channels
    pub heartbeat_interval: Duration,
    /// Backlog capacity of each per-user notification channel
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            token_secret: "chatme-dev-secret".to_string(),
            token_ttl_days: 30,
            heartbeat_interval: Duration::from_secs(30),
            channel_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = std::env::var("CHATME_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bind_addr);

        let token_secret =
            std::env::var("CHATME_TOKEN_SECRET").unwrap_or(defaults.token_secret);

        let token_ttl_days = std::env::var("CHATME_TOKEN_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.token_ttl_days);

        let heartbeat_interval = std::env::var("CHATME_HEARTBEAT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval);

        Self {
            bind_addr,
            token_secret,
            token_ttl_days,
            heartbeat_interval,
            channel_capacity: defaults.channel_capacity,
        }
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub verifier: Arc<TokenVerifier>,
    pub users: Arc<UserDirectory>,
    pub store: Arc<ChatStore>,
    pub broker: Arc<NotificationBroker>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let verifier = Arc::new(TokenVerifier::new(
            &config.token_secret,
            chrono::Duration::days(config.token_ttl_days),
        ));
        let broker = Arc::new(NotificationBroker::new(config.channel_capacity));

        Self {
            config,
            verifier,
            users: Arc::new(UserDirectory::new()),
            store: Arc::new(ChatStore::new()),
            broker,
        }
    }
}
