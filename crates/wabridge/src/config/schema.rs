use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::secrets::SecretSource;

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v18.0";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Credentials and endpoints for the WhatsApp Business Platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Shared secret echoed back during the subscription handshake.
    #[serde(default)]
    pub verify_token: SecretSource,
    /// Bearer token for Graph API calls.
    #[serde(default)]
    pub access_token: SecretSource,
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: SecretSource::default(),
            access_token: SecretSource::default(),
            phone_number_id: None,
            graph_base_url: default_graph_base_url(),
            api_version: default_api_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn wabridge_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wabridge")
}

fn default_uploads_dir() -> PathBuf {
    wabridge_home().join("uploads")
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| wabridge_home().join("wabridge.db"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl WhatsAppConfig {
    /// `{graph_base_url}/{api_version}` without a trailing slash.
    pub fn graph_api_root(&self) -> String {
        format!(
            "{}/{}",
            self.graph_base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.whatsapp.api_version, "v18.0");
        assert_eq!(config.logging.level, "info");
        assert!(!config.whatsapp.verify_token.is_configured());
        assert!(config.storage.uploads_dir.ends_with("uploads"));
    }

    #[test]
    fn test_graph_api_root_trims_slashes() {
        let wa = WhatsAppConfig {
            graph_base_url: "http://127.0.0.1:1234/".to_string(),
            ..Default::default()
        };
        assert_eq!(wa.graph_api_root(), "http://127.0.0.1:1234/v18.0");
    }

    #[test]
    fn test_secret_sources_deserialize() {
        let json = r#"{
            "whatsapp": {
                "verify_token": { "value": "hub-secret" },
                "access_token": { "file": "/run/secrets/wa_token" },
                "phone_number_id": "10987"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.whatsapp.verify_token.value.as_deref(), Some("hub-secret"));
        assert_eq!(
            config.whatsapp.access_token.file.as_deref(),
            Some("/run/secrets/wa_token")
        );
        assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("10987"));
    }
}
