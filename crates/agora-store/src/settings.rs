//! The `settings` and `stats` singleton rows.
//!
//! Counter updates are single UPDATE statements computed from the row's own
//! pre-update values, so concurrent writers never lose increments.

use agora_shared::Entity;
use rusqlite::{params, OptionalExtension};

use crate::database::{count_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::{Config, ConfigPatch, Stats};

impl Database {
    // ------------------------------------------------------------------
    // Config
    // ------------------------------------------------------------------

    /// Seed the config singleton if it does not exist yet.
    /// Returns `true` if the row was created.
    pub fn ensure_config(&self, defaults: &Config) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO settings
                 (id, system_message, db_uri, db_name, register_feature, ai_feature, secret_key)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                defaults.system_message,
                defaults.db_uri,
                defaults.db_name,
                defaults.register_feature,
                defaults.ai_feature,
                defaults.secret_key,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_config(&self) -> Result<Config> {
        self.find_config()?.ok_or(StoreError::NotFound(Entity::Config))
    }

    pub fn find_config(&self) -> Result<Option<Config>> {
        let config = self
            .conn()
            .query_row(
                "SELECT system_message, db_uri, db_name, register_feature, ai_feature, secret_key
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(Config {
                        system_message: row.get(0)?,
                        db_uri: row.get(1)?,
                        db_name: row.get(2)?,
                        register_feature: row.get(3)?,
                        ai_feature: row.get(4)?,
                        secret_key: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(config)
    }

    /// Merge the supplied keys into the config singleton and return the result.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<Config> {
        let tx = self.conn_mut().transaction()?;
        let affected = tx.execute(
            "UPDATE settings SET
                 system_message   = COALESCE(?1, system_message),
                 db_uri           = COALESCE(?2, db_uri),
                 db_name          = COALESCE(?3, db_name),
                 register_feature = COALESCE(?4, register_feature),
                 ai_feature       = COALESCE(?5, ai_feature),
                 secret_key       = COALESCE(?6, secret_key)
             WHERE id = 1",
            params![
                patch.system_message,
                patch.db_uri,
                patch.db_name,
                patch.register_feature,
                patch.ai_feature,
                patch.secret_key,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::Config));
        }
        tx.commit()?;

        self.get_config()
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<Stats> {
        self.conn()
            .query_row(
                "SELECT temperature, max_tokens, total_requests, total_ai_responses,
                        average_response_time, ai_response_rate
                 FROM stats WHERE id = 1",
                [],
                |row| {
                    let total_requests: i64 = row.get(2)?;
                    let total_ai_responses: i64 = row.get(3)?;
                    Ok(Stats {
                        temperature: row.get(0)?,
                        max_tokens: row.get(1)?,
                        total_requests: count_from_sql(total_requests),
                        total_ai_responses: count_from_sql(total_ai_responses),
                        average_response_time: row.get(4)?,
                        ai_response_rate: row.get(5)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(Entity::Stats),
                other => StoreError::from(other),
            })
    }

    /// Write the AI tuning knobs in a single statement.  `None` leaves a
    /// value untouched.
    pub fn set_ai_settings(&self, temperature: Option<f64>, max_tokens: Option<u32>) -> Result<Stats> {
        let affected = self.conn().execute(
            "UPDATE stats SET
                 temperature = COALESCE(?1, temperature),
                 max_tokens  = COALESCE(?2, max_tokens)
             WHERE id = 1",
            params![temperature, max_tokens],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::Stats));
        }
        self.get_stats()
    }

    pub fn increment_total_requests(&self) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE stats SET total_requests = total_requests + 1 WHERE id = 1",
            [],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::Stats));
        }
        Ok(())
    }

    /// Count one AI response taking `elapsed_secs` and fold it into the
    /// running average and the response rate.
    pub fn record_ai_response(&self, elapsed_secs: f64) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE stats SET
                 average_response_time =
                     (average_response_time * total_ai_responses + ?1) / (total_ai_responses + 1),
                 ai_response_rate = CASE
                     WHEN total_requests > 0
                     THEN (total_ai_responses + 1) * 100.0 / total_requests
                     ELSE 0
                 END,
                 total_ai_responses = total_ai_responses + 1
             WHERE id = 1",
            params![elapsed_secs],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::Stats));
        }
        Ok(())
    }
}
