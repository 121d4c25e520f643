use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, error};

use crate::sync::SyncSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Default level for this crate when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// API root of a remote store, e.g. `http://127.0.0.1:3000/api`
    pub store_url: Option<String>,

    /// Quiet period before a content save is written
    #[serde(default = "default_content_debounce_ms")]
    pub content_debounce_ms: u64,

    /// Quiet period before a cursor update is written; a tenth of the content delay when unset
    pub presence_debounce_ms: Option<u64>,

    /// Collaborators idle for longer are no longer listed as active
    #[serde(default = "default_presence_idle_secs")]
    pub presence_idle_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                config.validate()
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Build a configuration from explicit key/value pairs instead of the process environment
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars)
            .map_err(ConfigError::EnvError)?
            .validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.content_debounce_ms == 0 {
            return Err(ConfigError::Invalid("CONTENT_DEBOUNCE_MS must be greater than zero".to_string()));
        }
        if let Some(presence) = self.presence_debounce_ms {
            if presence > self.content_debounce_ms {
                return Err(ConfigError::Invalid(format!(
                    "PRESENCE_DEBOUNCE_MS ({}) must not exceed CONTENT_DEBOUNCE_MS ({})",
                    presence, self.content_debounce_ms
                )));
            }
        }
        Ok(self)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Filter used when RUST_LOG is unset
    pub fn default_log_filter(&self) -> String {
        format!("colabri_sync={lvl},tower_http={lvl},axum::rejection=trace,info", lvl = self.log_level)
    }

    /// Timing used by every session the engine opens
    pub fn sync_settings(&self) -> SyncSettings {
        let mut settings = SyncSettings::with_content_delay(Duration::from_millis(self.content_debounce_ms));
        if let Some(presence) = self.presence_debounce_ms {
            settings.presence_delay = Duration::from_millis(presence);
        }
        settings.presence_idle = Duration::from_secs(self.presence_idle_secs);
        settings
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            service_name: default_service_name(),
            store_url: None,
            content_debounce_ms: default_content_debounce_ms(),
            presence_debounce_ms: None,
            presence_idle_secs: default_presence_idle_secs(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "colabri-sync".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_content_debounce_ms() -> u64 {
    1000
}

fn default_presence_idle_secs() -> u64 {
    60
}
