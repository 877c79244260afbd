use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::InputSpace;
use crate::services::DEFAULT_PROFILE;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub directions: DirectionsSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsSettings {
    #[serde(default = "default_directions_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Unset means no explicit timeout beyond the transport's own
    pub timeout_secs: Option<u64>,
}

impl DirectionsSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for DirectionsSettings {
    fn default() -> Self {
        Self {
            base_url: default_directions_url(),
            api_key: String::new(),
            profile: default_profile(),
            timeout_secs: None,
        }
    }
}

fn default_directions_url() -> String { "https://api.openrouteservice.org".to_string() }
fn default_profile() -> String { DEFAULT_PROFILE.to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default)]
    pub input_space: InputSpace,
    /// Boolean form of `input_space`; takes precedence when set
    #[serde(default)]
    pub evaluate_scaled: Option<bool>,
}

impl RiskSettings {
    /// Coordinate space the mixture is evaluated in
    pub fn effective_input_space(&self) -> InputSpace {
        match self.evaluate_scaled {
            Some(true) => InputSpace::Scaled,
            Some(false) => InputSpace::Raw,
            None => self.input_space,
        }
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_space: InputSpace::default(),
            evaluate_scaled: None,
        }
    }
}

fn default_model_path() -> String { "assets/risk_model.json".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SAFE_ROUTE__)
    /// 5. `ORS_API_KEY` for the directions key
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SAFE_ROUTE__SERVER__PORT -> server.port
            .add_source(env_source())
            .build()?;

        let settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        let settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("SAFE_ROUTE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Pick up well-known variables that don't follow the prefixed naming
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = std::env::var("ORS_API_KEY") {
        builder = builder.set_override("directions.api_key", api_key)?;
    }

    builder.build()
}
