//! Runtime configuration handle shared through application state.
//!
//! The provider holds the file/env configuration as its base and overlays
//! the WhatsApp settings persisted in the `settings` table. Readers take a
//! cheap `Arc<Config>` snapshot; writers persist first, then swap the
//! snapshot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::loader::validate_config;
use crate::config::schema::Config;
use crate::db::{settings_repo, Database};
use crate::error::ConfigError;
use crate::secrets::SecretSource;

const KEY_VERIFY_TOKEN: &str = "whatsapp.verify_token";
const KEY_ACCESS_TOKEN: &str = "whatsapp.access_token";
const KEY_PHONE_NUMBER_ID: &str = "whatsapp.phone_number_id";
const WHATSAPP_PREFIX: &str = "whatsapp.";

/// Partial update of the WhatsApp settings. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppSettingsUpdate {
    #[serde(default)]
    pub verify_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

/// What the settings endpoint may show. Secrets are reported only as
/// configured or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatsAppSettingsView {
    pub phone_number_id: Option<String>,
    pub verify_token_configured: bool,
    pub access_token_configured: bool,
    pub graph_base_url: String,
    pub api_version: String,
}

pub struct ConfigProvider {
    base: Config,
    db: Database,
    current: RwLock<Arc<Config>>,
}

impl ConfigProvider {
    /// Builds the provider and applies any settings already persisted.
    pub fn new(base: Config, db: Database) -> Result<Self, ConfigError> {
        let effective = overlay(&base, &settings_repo::get_prefixed(&db, WHATSAPP_PREFIX)?);
        validate_config(&effective)?;
        Ok(Self {
            base,
            db,
            current: RwLock::new(Arc::new(effective)),
        })
    }

    /// Snapshot of the effective configuration.
    pub fn current(&self) -> Arc<Config> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-reads persisted settings and swaps the snapshot.
    pub fn reload(&self) -> Result<Arc<Config>, ConfigError> {
        let stored = settings_repo::get_prefixed(&self.db, WHATSAPP_PREFIX)?;
        let effective = Arc::new(overlay(&self.base, &stored));
        validate_config(&effective)?;

        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&effective),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&effective),
        }
        info!("Configuration reloaded");
        Ok(effective)
    }

    /// Persists the given WhatsApp settings, then reloads.
    pub fn update_whatsapp(
        &self,
        update: &WhatsAppSettingsUpdate,
    ) -> Result<Arc<Config>, ConfigError> {
        if let Some(id) = &update.phone_number_id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Validation {
                    message: format!("Phone number id must be numeric: {}", id),
                });
            }
        }

        let mut pairs: Vec<(&str, &str)> = Vec::new();
        if let Some(v) = update.verify_token.as_deref().filter(|v| !v.is_empty()) {
            pairs.push((KEY_VERIFY_TOKEN, v));
        }
        if let Some(v) = update.access_token.as_deref().filter(|v| !v.is_empty()) {
            pairs.push((KEY_ACCESS_TOKEN, v));
        }
        if let Some(v) = update.phone_number_id.as_deref() {
            pairs.push((KEY_PHONE_NUMBER_ID, v));
        }

        if !pairs.is_empty() {
            settings_repo::set_many(&self.db, &pairs)?;
        }
        self.reload()
    }

    pub fn whatsapp_view(&self) -> WhatsAppSettingsView {
        let config = self.current();
        let wa = &config.whatsapp;
        WhatsAppSettingsView {
            phone_number_id: wa.phone_number_id.clone(),
            verify_token_configured: wa.verify_token.is_configured(),
            access_token_configured: wa.access_token.is_configured(),
            graph_base_url: wa.graph_base_url.clone(),
            api_version: wa.api_version.clone(),
        }
    }
}

fn overlay(base: &Config, stored: &HashMap<String, String>) -> Config {
    let mut config = base.clone();
    if let Some(v) = stored.get(KEY_VERIFY_TOKEN) {
        config.whatsapp.verify_token = SecretSource::from_value(v.clone());
    }
    if let Some(v) = stored.get(KEY_ACCESS_TOKEN) {
        config.whatsapp.access_token = SecretSource::from_value(v.clone());
    }
    if let Some(v) = stored.get(KEY_PHONE_NUMBER_ID) {
        config.whatsapp.phone_number_id = Some(v.clone());
    }
    config
}

impl Config {
    pub fn verify_token(&self) -> Result<Option<SecretString>, ConfigError> {
        self.whatsapp
            .verify_token
            .resolve()
            .map_err(|e| ConfigError::Secret {
                name: "verify_token".to_string(),
                source: e,
            })
    }

    pub fn access_token(&self) -> Result<Option<SecretString>, ConfigError> {
        self.whatsapp
            .access_token
            .resolve()
            .map_err(|e| ConfigError::Secret {
                name: "access_token".to_string(),
                source: e,
            })
    }
}
