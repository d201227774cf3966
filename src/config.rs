// Engine configuration
// Loaded from TRAVEL_-prefixed environment variables (nested keys use __, e.g.
// TRAVEL_AMADEUS__CLIENT_ID) on top of built-in defaults, then validated.

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderEnvironment {
    #[default]
    Test,
    Production,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub amadeus: AmadeusConfig,
    pub skyscanner: SkyscannerConfig,
    pub aggregation: AggregationConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

// OAuth client-credentials provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmadeusConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub environment: ProviderEnvironment,
    // Overrides the environment's base URL when set
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            environment: ProviderEnvironment::Test,
            base_url: None,
            timeout_ms: 10_000,
        }
    }
}

impl AmadeusConfig {
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = self.base_url.as_ref().filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        match self.environment {
            ProviderEnvironment::Test => "https://test.api.amadeus.com".to_string(),
            ProviderEnvironment::Production => "https://api.amadeus.com".to_string(),
        }
    }
}

// API-key quote provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyscannerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub host: String,
    pub market: String,
    pub locale: String,
    pub timeout_ms: u64,
}

impl Default for SkyscannerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://skyscanner-skyscanner-flight-search-v1.p.rapidapi.com".to_string(),
            host: "skyscanner-skyscanner-flight-search-v1.p.rapidapi.com".to_string(),
            market: "US".to_string(),
            locale: "en-US".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    // Upper bound for a single provider attempt before it is recorded as failed
    pub provider_timeout_ms: u64,
    pub flight_providers: Vec<String>,
    pub hotel_providers: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 10_000,
            flight_providers: vec!["amadeus".to_string(), "skyscanner".to_string()],
            hotel_providers: vec!["amadeus".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 15 * 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    // One of error, warn, info, debug, trace
    pub level: String,
    // pretty or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(
                Environment::with_prefix("TRAVEL")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("aggregation.flight_providers")
                    .with_list_parse_key("aggregation.hotel_providers")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregation.provider_timeout_ms == 0 || self.aggregation.provider_timeout_ms > 120_000 {
            return Err(ConfigError::Invalid(
                "aggregation.provider_timeout_ms must be between 1 and 120000".to_string(),
            ));
        }

        if self.cache.ttl_seconds == 0 || self.cache.ttl_seconds > 24 * 60 * 60 {
            return Err(ConfigError::Invalid(
                "cache.ttl_seconds must be between 1 and 86400".to_string(),
            ));
        }

        for (name, timeout) in [
            ("amadeus", self.amadeus.timeout_ms),
            ("skyscanner", self.skyscanner.timeout_ms),
        ] {
            if timeout == 0 {
                return Err(ConfigError::Invalid(format!("{name}.timeout_ms cannot be 0")));
            }
        }

        for (name, url) in [
            ("amadeus.base_url", self.amadeus.resolved_base_url()),
            ("skyscanner.base_url", self.skyscanner.base_url.clone()),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be an HTTP or HTTPS URL, got '{url}'"
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}
