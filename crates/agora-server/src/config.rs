//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use agora_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS,
};
use agora_shared::RoomId;
use agora_store::Config;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `agora.db` in the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Room every user may read regardless of membership.
    /// Env: `SYSTEM_AI_ROOM_ID`
    pub system_ai_room: Option<RoomId>,

    /// Secret used to sign session tokens. Only seeds a fresh database;
    /// afterwards the persisted settings document wins.
    /// Env: `SECRET_KEY`
    /// Default: random per process.
    pub secret_key: String,

    /// Env: `SESSION_TTL_HOURS`
    /// Default: `24`
    pub session_ttl_hours: i64,

    // -- Seeds for the settings document --

    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Env: `AI_FEATURE` (true/false)
    /// Default: `true`
    pub ai_feature: bool,

    /// Env: `SYSTEM_MESSAGE`
    pub system_message: Option<String>,

    /// Username promoted to admin at startup.
    /// Env: `BOOTSTRAP_ADMIN`
    pub bootstrap_admin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            system_ai_room: None,
            secret_key: random_secret(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            registration_open: true,
            ai_feature: true,
            system_message: None,
            bootstrap_admin: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("system_ai_room", &self.system_ai_room)
            .field("secret_key", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("registration_open", &self.registration_open)
            .field("ai_feature", &self.ai_feature)
            .field("system_message", &self.system_message)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(id) = var("SYSTEM_AI_ROOM_ID").filter(|v| !v.is_empty()) {
            match RoomId::parse(&id) {
                Ok(room) => config.system_ai_room = Some(room),
                Err(e) => tracing::warn!(value = %id, error = %e, "Invalid SYSTEM_AI_ROOM_ID, ignoring"),
            }
        }

        match var("SECRET_KEY").filter(|s| !s.is_empty()) {
            Some(secret) => config.secret_key = secret,
            None => tracing::warn!(
                "SECRET_KEY not set, a random secret is used if the database is new"
            ),
        }

        if let Some(val) = var("SESSION_TTL_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => {
                    config.session_ttl_hours = hours
                }
                _ => tracing::warn!(
                    value = %val,
                    max = MAX_SESSION_TTL_HOURS,
                    "Invalid SESSION_TTL_HOURS, using default"
                ),
            }
        }

        if let Some(val) = var("REGISTRATION_OPEN") {
            config.registration_open = flag(&val);
        }

        if let Some(val) = var("AI_FEATURE") {
            config.ai_feature = flag(&val);
        }

        config.system_message = var("SYSTEM_MESSAGE").filter(|m| !m.trim().is_empty());
        config.bootstrap_admin = var("BOOTSTRAP_ADMIN").filter(|u| !u.trim().is_empty());

        config
    }

    /// The settings document written when the database has none yet.
    pub fn default_settings(&self, db_path: &Path) -> Config {
        Config {
            system_message: self.system_message.clone(),
            db_uri: format!("sqlite://{}", db_path.display()),
            db_name: "agora".to_string(),
            register_feature: self.registration_open,
            ai_feature: self.ai_feature,
            secret_key: self.secret_key.clone(),
        }
    }
}

fn flag(val: &str) -> bool {
    val != "false" && val != "0"
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
