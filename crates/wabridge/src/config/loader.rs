use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::secrets::SecretSource;

/// Env var naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "WABRIDGE_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses and validates a config document. Environment overrides are not
/// applied here; see [`load_effective_config`].
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads the file named by `path` (or `WABRIDGE_CONFIG`, or nothing),
/// applies environment overrides and validates the result.
pub fn load_effective_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path: Option<PathBuf> = match path {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var_os(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
    };

    let mut config = match path {
        Some(p) => load_config(&p)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Overlays the well-known environment variables on top of `config`.
///
/// Credential variables replace the whole source, so a file-configured
/// token is superseded by an explicitly exported one.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if env_value("WHATSAPP_VERIFY_TOKEN").is_some() {
        config.whatsapp.verify_token = SecretSource::from_env("WHATSAPP_VERIFY_TOKEN");
    }
    if env_value("WHATSAPP_ACCESS_TOKEN").is_some() {
        config.whatsapp.access_token = SecretSource::from_env("WHATSAPP_ACCESS_TOKEN");
    }
    if let Some(v) = env_value("WHATSAPP_PHONE_NUMBER_ID") {
        config.whatsapp.phone_number_id = Some(v);
    }
    if let Some(v) = env_value("WABRIDGE_BIND_ADDR") {
        config.server.bind_addr = v;
    }
    if let Some(v) = env_value("WABRIDGE_UPLOADS_DIR") {
        config.storage.uploads_dir = PathBuf::from(v);
    }
    if let Some(v) = env_value("WABRIDGE_DATABASE_PATH") {
        config.storage.database_path = PathBuf::from(v);
    }
    if let Some(v) = env_value("WABRIDGE_GRAPH_BASE_URL") {
        config.whatsapp.graph_base_url = v;
    }
    if let Some(v) = env_value("WABRIDGE_LOG_LEVEL") {
        config.logging.level = v;
    }
    if let Some(v) = env_value("WABRIDGE_LOG_JSON") {
        config.logging.json = match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(ConfigError::Validation {
                    message: format!("WABRIDGE_LOG_JSON must be a boolean, got '{}'", other),
                })
            }
        };
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Validation {
            message: format!("Invalid bind address: {}", config.server.bind_addr),
        });
    }

    let base = &config.whatsapp.graph_base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::Validation {
            message: format!("Graph base URL must be http(s): {}", base),
        });
    }

    let version = &config.whatsapp.api_version;
    if !version.starts_with('v') || version.len() < 2 {
        return Err(ConfigError::Validation {
            message: format!("Unsupported Graph API version: {}", version),
        });
    }

    if let Some(id) = &config.whatsapp.phone_number_id {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Validation {
                message: format!("Phone number id must be numeric: {}", id),
            });
        }
    }

    if config.storage.uploads_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "Uploads directory must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ALL_ENV: &[&str] = &[
        "WABRIDGE_CONFIG",
        "WHATSAPP_VERIFY_TOKEN",
        "WHATSAPP_ACCESS_TOKEN",
        "WHATSAPP_PHONE_NUMBER_ID",
        "WABRIDGE_BIND_ADDR",
        "WABRIDGE_UPLOADS_DIR",
        "WABRIDGE_DATABASE_PATH",
        "WABRIDGE_GRAPH_BASE_URL",
        "WABRIDGE_LOG_LEVEL",
        "WABRIDGE_LOG_JSON",
    ];

    fn clear_env() {
        for name in ALL_ENV {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "server": { "bind_addr": "127.0.0.1:9000" },
            "whatsapp": {
                "verify_token": { "value": "hub" },
                "phone_number_id": "123456"
            },
            "storage": { "uploads_dir": "/srv/uploads", "database_path": "/srv/wa.db" },
            "logging": { "level": "debug", "json": true }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.storage.uploads_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_bind_addr_rejected() {
        let result = load_config_from_str(r#"{ "server": { "bind_addr": "nope" } }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_non_numeric_phone_number_id_rejected() {
        let result = load_config_from_str(r#"{ "whatsapp": { "phone_number_id": "abc" } }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_config("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "whatsapp": {{ "verify_token": {{ "value": "from-file" }}, "phone_number_id": "1" }} }}"#
        )
        .unwrap();

        std::env::set_var("WABRIDGE_CONFIG", file.path());
        std::env::set_var("WHATSAPP_VERIFY_TOKEN", "from-env");
        std::env::set_var("WHATSAPP_PHONE_NUMBER_ID", "42");
        std::env::set_var("WABRIDGE_LOG_JSON", "true");

        let config = load_effective_config(None).unwrap();
        assert_eq!(
            config.whatsapp.verify_token.env.as_deref(),
            Some("WHATSAPP_VERIFY_TOKEN")
        );
        assert_eq!(config.whatsapp.verify_token.value, None);
        assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("42"));
        assert!(config.logging.json);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        clear_env();
        let config = load_effective_config(None).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert!(!config.whatsapp.access_token.is_configured());
    }

    #[test]
    #[serial]
    fn test_bad_boolean_env_rejected() {
        clear_env();
        std::env::set_var("WABRIDGE_LOG_JSON", "sometimes");
        let result = load_effective_config(None);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
        clear_env();
    }
}
