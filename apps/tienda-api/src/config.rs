//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TIENDA_PORT=8080                                                   │
//! │     TIENDA_PROCESSOR_ACCESS_TOKEN=...   (the only source for secrets)  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tienda/tienda.toml (Linux)                               │
//! │     ~/Library/Application Support/com.tienda.tienda/tienda.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "./tienda.db"
//! max_connections = 5
//!
//! [store]
//! name = "Tienda Norte"
//! site_url = "tiendanorte.com"
//! thank_you = "Gracias por su compra"
//! utc_offset_minutes = -180
//!
//! [processor]
//! base_url = "https://api.mercadopago.com"
//! notification_url = "https://tiendanorte.com/api/webhooks/payments"
//! success_url = "https://tiendanorte.com/checkout/success"
//!
//! [logging]
//! format = "json"   # pretty | json
//! ```

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tienda_core::receipt::StoreProfile;

/// Largest UTC offset a store can be configured with, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tienda.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Store details printed on receipts.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default)]
    pub site_url: String,

    #[serde(default = "default_thank_you")]
    pub thank_you: String,

    /// Local time offset used on receipts.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

fn default_store_name() -> String {
    "Tienda".to_string()
}

fn default_thank_you() -> String {
    "Gracias por su compra".to_string()
}

fn default_utc_offset() -> i32 {
    -180
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            site_url: String::new(),
            thank_you: default_thank_you(),
            utc_offset_minutes: default_utc_offset(),
        }
    }
}

impl StoreSettings {
    pub fn profile(&self) -> StoreProfile {
        StoreProfile {
            name: self.name.clone(),
            site_url: self.site_url.clone(),
            thank_you: self.thank_you.clone(),
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

/// Payment processor connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSettings {
    #[serde(default = "default_processor_url")]
    pub base_url: String,

    /// Read from `TIENDA_PROCESSOR_ACCESS_TOKEN` only; never from the file.
    #[serde(skip)]
    pub access_token: Option<SecretString>,

    /// Where the processor posts payment notifications.
    #[serde(default)]
    pub notification_url: Option<String>,

    /// Where the shopper lands after paying.
    #[serde(default)]
    pub success_url: Option<String>,

    #[serde(default)]
    pub failure_url: Option<String>,

    #[serde(default)]
    pub pending_url: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total time spent retrying a payment lookup.
    #[serde(default = "default_max_retry")]
    pub max_retry_secs: u64,
}

fn default_processor_url() -> String {
    "https://api.mercadopago.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retry() -> u64 {
    15
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        ProcessorSettings {
            base_url: default_processor_url(),
            access_token: None,
            notification_url: None,
            success_url: None,
            failure_url: None,
            pending_url: None,
            timeout_secs: default_timeout(),
            max_retry_secs: default_max_retry(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub format: LogFormat,

    /// `EnvFilter` directives; `RUST_LOG` still wins.
    #[serde(default)]
    pub filter: Option<String>,
}

// =============================================================================
// ApiConfig
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub processor: ProcessorSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ApiConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tienda.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.store.name.trim().is_empty() {
            return Err(ConfigError::Invalid("store.name is required".into()));
        }

        if self.store.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "store.utc_offset_minutes must be within ±{}, got {}",
                MAX_UTC_OFFSET_MINUTES, self.store.utc_offset_minutes
            )));
        }

        let urls = [
            ("processor.base_url", Some(&self.processor.base_url)),
            ("processor.notification_url", self.processor.notification_url.as_ref()),
            ("processor.success_url", self.processor.success_url.as_ref()),
            ("processor.failure_url", self.processor.failure_url.as_ref()),
            ("processor.pending_url", self.processor.pending_url.as_ref()),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "{field} must start with http:// or https://, got: {url}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Applies `TIENDA_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("TIENDA_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(port) = var("TIENDA_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid TIENDA_PORT"),
            }
        }

        if let Some(path) = var("TIENDA_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Some(name) = var("TIENDA_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(url) = var("TIENDA_SITE_URL") {
            self.store.site_url = url;
        }

        if let Some(offset) = var("TIENDA_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.store.utc_offset_minutes = minutes,
                Err(_) => warn!(offset = %offset, "Ignoring invalid TIENDA_UTC_OFFSET_MINUTES"),
            }
        }

        if let Some(url) = var("TIENDA_PROCESSOR_URL") {
            self.processor.base_url = url;
        }

        if let Some(token) = var("TIENDA_PROCESSOR_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
            self.processor.access_token = Some(SecretString::from(token));
        }

        if let Some(url) = var("TIENDA_NOTIFICATION_URL") {
            self.processor.notification_url = Some(url);
        }

        if let Some(url) = var("TIENDA_SUCCESS_URL") {
            self.processor.success_url = Some(url);
        }

        if let Some(format) = var("TIENDA_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "pretty" => self.logging.format = LogFormat::Pretty,
                _ => warn!(format = %format, "Unknown log format in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tienda", "tienda")
            .map(|dirs| dirs.config_dir().join("tienda.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.processor.access_token.is_none());
    }

    #[test]
    fn test_partial_file() {
        let config = ApiConfig::from_toml(
            r#"
            [store]
            name = "Tienda Norte"
            site_url = "tiendanorte.com"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "Tienda Norte");
        assert_eq!(config.store.utc_offset_minutes, -180);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Json);

        let profile = config.store.profile();
        assert_eq!(profile.site_url, "tiendanorte.com");
        assert_eq!(profile.thank_you, "Gracias por su compra");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TIENDA_PORT", "9090"),
            ("TIENDA_DB_PATH", "/tmp/t.db"),
            ("TIENDA_PROCESSOR_ACCESS_TOKEN", "TEST-123"),
            ("TIENDA_UTC_OFFSET_MINUTES", "not-a-number"),
            ("TIENDA_LOG_FORMAT", "JSON"),
        ]);
        let mut config = ApiConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, PathBuf::from("/tmp/t.db"));
        assert_eq!(
            config.processor.access_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("TEST-123".to_string())
        );
        assert_eq!(config.store.utc_offset_minutes, -180);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_token_is_not_read_from_file() {
        let config = ApiConfig::from_toml(
            r#"
            [processor]
            access_token = "leaked"
            "#,
        )
        .unwrap();
        assert!(config.processor.access_token.is_none());
    }

    #[test]
    fn test_validation() {
        let mut config = ApiConfig::default();
        config.store.utc_offset_minutes = 15 * 60;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ApiConfig::default();
        config.processor.notification_url = Some("ftp://example.com".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ApiConfig::default();
        config.store.name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
