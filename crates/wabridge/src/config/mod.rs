pub mod loader;
pub mod provider;
pub mod schema;

pub use loader::{apply_env_overrides, load_config, load_config_from_str, load_effective_config};
pub use provider::{ConfigProvider, WhatsAppSettingsUpdate, WhatsAppSettingsView};
pub use schema::{Config, LoggingConfig, ServerConfig, StorageConfig, WhatsAppConfig};
