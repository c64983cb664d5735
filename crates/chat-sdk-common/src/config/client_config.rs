//! Client configuration structs
//!
//! Loads configuration from environment variables (and an optional `.env` file).

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub rate_limit: RateLimitSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Gateway session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway endpoint (ws:// or wss://)
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Credential sent in Identify and Resume
    pub token: String,
    /// Base delay for exponential reconnect backoff
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Reconnect attempts before giving up until the next explicit connect
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Dispatch names that are not emitted on their named channel
    #[serde(default)]
    pub ignored_events: Vec<String>,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub properties: ClientPropertiesConfig,
}

impl GatewayConfig {
    /// Create a gateway configuration with default tuning
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            ignored_events: Vec::new(),
            presence: PresenceConfig::default(),
            properties: ClientPropertiesConfig::default(),
        }
    }

    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_ignored_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_events = events.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceConfig) -> Self {
        self.presence = presence;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ClientPropertiesConfig) -> Self {
        self.properties = properties;
        self
    }

    /// Base reconnect delay as a `Duration`
    #[must_use]
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Check whether a dispatch name is on the ignore list
    #[must_use]
    pub fn is_ignored(&self, event_name: &str) -> bool {
        self.ignored_events.iter().any(|e| e == event_name)
    }
}

/// Initial presence announced in Identify
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_presence_status")]
    pub status: String,
    #[serde(default)]
    pub afk: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            status: default_presence_status(),
            afk: false,
        }
    }
}

/// Client metadata announced in Identify
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientPropertiesConfig {
    #[serde(default = "default_client_os")]
    pub os: String,
    #[serde(default = "default_client_name")]
    pub browser: String,
    #[serde(default = "default_client_name")]
    pub device: String,
}

impl Default for ClientPropertiesConfig {
    fn default() -> Self {
        Self {
            os: default_client_os(),
            browser: default_client_name(),
            device: default_client_name(),
        }
    }
}

/// Client-side rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// When false every admission resolves immediately
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Optional JSON file holding the route limit table
    #[serde(default)]
    pub routes_file: Option<PathBuf>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            routes_file: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-sdk".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_presence_status() -> String {
    "online".to_string()
}

fn default_client_os() -> String {
    env::consts::OS.to_string()
}

fn default_client_name() -> String {
    "chat-sdk".to_string()
}

fn default_rate_limit_enabled() -> bool {
    true
}

/// Parse an optional variable, failing loudly on malformed values
fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(None),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Returns an error if required keys are missing or malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = match lookup("APP_ENV") {
            Some(raw) => {
                Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?
            }
            None => Environment::default(),
        };

        let token = lookup("GATEWAY_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let defaults = ClientPropertiesConfig::default();

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: app_env,
            },
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                token,
                reconnect_base_delay_ms: parse_var(&lookup, "GATEWAY_RECONNECT_BASE_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_base_delay_ms),
                max_reconnect_attempts: parse_var(&lookup, "GATEWAY_MAX_RECONNECT_ATTEMPTS")?
                    .unwrap_or_else(default_max_reconnect_attempts),
                ignored_events: lookup("GATEWAY_IGNORED_EVENTS")
                    .map(|s| parse_list(&s))
                    .unwrap_or_default(),
                presence: PresenceConfig {
                    status: lookup("GATEWAY_PRESENCE_STATUS")
                        .unwrap_or_else(default_presence_status),
                    afk: parse_var(&lookup, "GATEWAY_PRESENCE_AFK")?.unwrap_or(false),
                },
                properties: ClientPropertiesConfig {
                    os: lookup("GATEWAY_CLIENT_OS").unwrap_or(defaults.os),
                    browser: lookup("GATEWAY_CLIENT_BROWSER").unwrap_or(defaults.browser),
                    device: lookup("GATEWAY_CLIENT_DEVICE").unwrap_or(defaults.device),
                },
            },
            rate_limit: RateLimitSettings {
                enabled: parse_var(&lookup, "RATE_LIMIT_ENABLED")?
                    .unwrap_or_else(default_rate_limit_enabled),
                routes_file: lookup("RATE_LIMIT_ROUTES_FILE").map(PathBuf::from),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
