//! The [`ChatService`] facade shared by every request handler.
//!
//! The service owns the store handle behind a mutex, the two auth contracts
//! and a cached copy of the config singleton.

use std::sync::{Arc, Mutex, RwLock};

use agora_shared::auth::{PasswordHasher, SessionTokens};
use agora_shared::{DomainError, Result, RoomId};
use agora_store::{Config, Database};

pub struct ChatService {
    db: Mutex<Database>,
    pub(crate) hasher: Arc<dyn PasswordHasher>,
    pub(crate) tokens: Arc<dyn SessionTokens>,
    /// Room every user may read, regardless of membership.
    pub(crate) system_ai_room: Option<RoomId>,
    config: RwLock<Config>,
}

impl ChatService {
    /// Build the service on top of an opened database.
    ///
    /// The config singleton must already exist (see
    /// [`Database::ensure_config`]); it is loaded once here and refreshed by
    /// [`ChatService::update_config`].
    pub fn new(
        db: Database,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn SessionTokens>,
        system_ai_room: Option<RoomId>,
    ) -> Result<Self> {
        let config = db.get_config()?;

        tracing::info!(
            register_feature = config.register_feature,
            ai_feature = config.ai_feature,
            system_ai_room = ?system_ai_room,
            "chat service ready"
        );

        Ok(Self {
            db: Mutex::new(db),
            hasher,
            tokens,
            system_ai_room,
            config: RwLock::new(config),
        })
    }

    pub fn system_ai_room(&self) -> Option<RoomId> {
        self.system_ai_room
    }

    /// Run `f` with exclusive access to the store.
    pub(crate) fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut guard = self
            .db
            .lock()
            .map_err(|e| DomainError::StoreUnavailable(format!("Lock poisoned: {e}")))?;
        f(&mut guard)
    }

    /// Snapshot of the cached config.
    pub(crate) fn cached_config(&self) -> Result<Config> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|e| DomainError::StoreUnavailable(format!("Lock poisoned: {e}")))
    }

    pub(crate) fn replace_cached_config(&self, config: Config) -> Result<()> {
        let mut guard = self
            .config
            .write()
            .map_err(|e| DomainError::StoreUnavailable(format!("Lock poisoned: {e}")))?;
        *guard = config;
        Ok(())
    }
}
