//! # agora-server
//!
//! HTTP front end for the Agora chat service.
//!
//! This binary provides:
//! - **Accounts**: registration, login and profile updates with bearer
//!   session tokens
//! - **Rooms**: creation, join codes, membership, bans and message history
//! - **Admin API**: paginated listings, cascading deletions, account
//!   moderation and the global config / AI settings documents

mod api;
mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use agora_core::ChatService;
use agora_shared::password::Argon2Hasher;
use agora_shared::session::SessionSigner;
use agora_shared::{DomainError, Entity};
use agora_store::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agora_server=debug,agora_core=debug")),
        )
        .init();

    info!("Starting Agora server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and seed the settings document
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Database::open_at(path)?
        }
        None => Database::new()?,
    };
    let db_path = db.path().unwrap_or_else(|| PathBuf::from("agora.db"));

    if db.ensure_config(&config.default_settings(&db_path))? {
        info!(path = %db_path.display(), "Seeded settings from environment");
    }
    // The persisted secret wins over SECRET_KEY once the database exists.
    let settings = db.get_config()?;

    // -----------------------------------------------------------------------
    // 4. Build the service
    // -----------------------------------------------------------------------
    let hasher = Arc::new(Argon2Hasher::new());
    let tokens = Arc::new(SessionSigner::new(
        &settings.secret_key,
        chrono::Duration::hours(config.session_ttl_hours),
    ));
    let service = ChatService::new(db, hasher, tokens, config.system_ai_room)?;

    if let Some(username) = &config.bootstrap_admin {
        match service.promote_to_admin(username) {
            Ok(user) => info!(user_id = %user.id, username = %user.username, "Bootstrap admin ready"),
            Err(DomainError::NotFound(Entity::User)) => {
                warn!(username = %username, "BOOTSTRAP_ADMIN user does not exist yet")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let app_state = AppState {
        service: Arc::new(service),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
