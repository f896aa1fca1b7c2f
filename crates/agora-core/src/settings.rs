//! Global config and AI settings.

use agora_shared::validation::{validate_max_tokens, validate_temperature};
use agora_shared::{ForbiddenKind, Result, UserId};
use agora_store::{Config, ConfigPatch, Stats};
use serde::Deserialize;
use tracing::info;

use crate::service::ChatService;

/// Requested change of the AI tuning knobs.  `None` leaves a value as is.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiSettingsUpdate {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatService {
    pub fn get_config(&self, actor: UserId) -> Result<Config> {
        self.require_admin(actor)?;
        self.with_db(|db| Ok(db.get_config()?))
    }

    /// Merge `patch` into the config singleton and refresh the cached copy.
    pub fn update_config(&self, actor: UserId, patch: &ConfigPatch) -> Result<Config> {
        self.require_admin(actor)?;

        if patch.is_empty() {
            tracing::debug!(actor = %actor, "empty config patch, nothing to write");
            return self.with_db(|db| Ok(db.get_config()?));
        }

        let config = self.with_db(|db| Ok(db.update_config(patch)?))?;
        self.replace_cached_config(config.clone())?;

        info!(
            actor = %actor,
            register_feature = config.register_feature,
            ai_feature = config.ai_feature,
            "config updated"
        );
        Ok(config)
    }

    pub fn get_ai_settings(&self, actor: UserId) -> Result<Stats> {
        self.require_admin(actor)?;
        self.with_db(|db| Ok(db.get_stats()?))
    }

    /// Validate every supplied value, then write them together.
    pub fn update_ai_settings(&self, actor: UserId, update: AiSettingsUpdate) -> Result<Stats> {
        if let Some(temperature) = update.temperature {
            validate_temperature(temperature)?;
        }
        if let Some(max_tokens) = update.max_tokens {
            validate_max_tokens(max_tokens)?;
        }
        self.require_admin(actor)?;

        let stats =
            self.with_db(|db| Ok(db.set_ai_settings(update.temperature, update.max_tokens)?))?;

        info!(
            actor = %actor,
            temperature = stats.temperature,
            max_tokens = stats.max_tokens,
            "AI settings updated"
        );
        Ok(stats)
    }

    /// Count one request to the assistant.
    pub fn record_ai_request(&self) -> Result<()> {
        self.with_db(|db| Ok(db.increment_total_requests()?))
    }

    /// Count one assistant answer that took `elapsed_secs`.
    pub fn record_ai_response(&self, elapsed_secs: f64) -> Result<()> {
        let elapsed = if elapsed_secs.is_finite() { elapsed_secs.max(0.0) } else { 0.0 };
        self.with_db(|db| Ok(db.record_ai_response(elapsed)?))
    }

    pub fn registration_enabled(&self) -> Result<bool> {
        Ok(self.cached_config()?.register_feature)
    }

    pub fn ai_enabled(&self) -> Result<bool> {
        Ok(self.cached_config()?.ai_feature)
    }

    /// Fails with `Forbidden(AiDisabled)` while the assistant is switched off.
    pub fn require_ai_enabled(&self) -> Result<()> {
        if self.ai_enabled()? {
            Ok(())
        } else {
            Err(ForbiddenKind::AiDisabled.into())
        }
    }

    /// The broadcast banner, if one is set.
    pub fn system_message(&self) -> Result<Option<String>> {
        Ok(self
            .cached_config()?
            .system_message
            .filter(|m| !m.trim().is_empty()))
    }
}
