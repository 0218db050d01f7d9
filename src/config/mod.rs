//! Configuration management
//!
//! This module handles loading and parsing configuration for CourseTrackr.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token signing and lifetimes
    #[serde(default)]
    pub auth: AuthConfig,
    /// Login rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Outgoing email (collaborator invitations)
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Externally reachable base URL, used to build invitation links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/coursetrackr.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Access and invitation token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign access tokens and invitation tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Invitation token lifetime in hours
    #[serde(default = "default_invite_ttl_hours")]
    pub invite_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
            invite_ttl_hours: default_invite_ttl_hours(),
        }
    }
}

/// Placeholder secret; `main` warns when it is still in use.
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_invite_ttl_hours() -> i64 {
    72
}

/// Login rate limiter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per identifier within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_max_requests() -> usize {
    5
}

fn default_window_seconds() -> u64 {
    300
}

/// SMTP settings for outgoing mail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// When false, messages are logged instead of sent
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address
    #[serde(default)]
    pub from_address: String,
    /// Sender display name
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: String::new(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "CourseTrackr".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `COURSETRACKR_<SECTION>_<KEY>`:
    /// - COURSETRACKR_SERVER_HOST, _PORT, _CORS_ORIGIN, _PUBLIC_URL
    /// - COURSETRACKR_DATABASE_DRIVER, COURSETRACKR_DATABASE_URL
    /// - COURSETRACKR_CACHE_TTL_SECONDS
    /// - COURSETRACKR_AUTH_JWT_SECRET, COURSETRACKR_AUTH_TOKEN_TTL_HOURS
    /// - COURSETRACKR_RATE_LIMIT_MAX_REQUESTS, COURSETRACKR_RATE_LIMIT_WINDOW_SECONDS
    /// - COURSETRACKR_EMAIL_ENABLED, _SMTP_HOST, _SMTP_PORT, _SMTP_USERNAME,
    ///   _SMTP_PASSWORD, _FROM_ADDRESS
    ///
    /// The merged configuration is validated before it is returned.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("COURSETRACKR_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("COURSETRACKR_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("COURSETRACKR_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(public_url) = std::env::var("COURSETRACKR_SERVER_PUBLIC_URL") {
            self.server.public_url = public_url;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("COURSETRACKR_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("COURSETRACKR_DATABASE_URL") {
            self.database.url = url;
        }

        // Cache configuration
        if let Ok(ttl) = std::env::var("COURSETRACKR_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("COURSETRACKR_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(hours) = std::env::var("COURSETRACKR_AUTH_TOKEN_TTL_HOURS") {
            if let Ok(hours) = hours.parse::<i64>() {
                self.auth.token_ttl_hours = hours;
            }
        }

        // Rate limit configuration
        if let Ok(max) = std::env::var("COURSETRACKR_RATE_LIMIT_MAX_REQUESTS") {
            if let Ok(max) = max.parse::<usize>() {
                self.rate_limit.max_requests = max;
            }
        }
        if let Ok(window) = std::env::var("COURSETRACKR_RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(window) = window.parse::<u64>() {
                self.rate_limit.window_seconds = window;
            }
        }

        // Email configuration
        if let Ok(enabled) = std::env::var("COURSETRACKR_EMAIL_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.email.enabled = enabled;
            }
        }
        if let Ok(host) = std::env::var("COURSETRACKR_EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(port) = std::env::var("COURSETRACKR_EMAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("COURSETRACKR_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("COURSETRACKR_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(from) = std::env::var("COURSETRACKR_EMAIL_FROM_ADDRESS") {
            self.email.from_address = from;
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 || self.auth.invite_ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_requests and rate_limit.window_seconds must be positive"
                    .to_string(),
            ));
        }
        if self.email.enabled
            && (self.email.smtp_host.trim().is_empty() || self.email.from_address.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "email.smtp_host and email.from_address are required when email is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
// Both `tests` and `property_tests` modules use this to prevent race conditions.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "COURSETRACKR_SERVER_HOST",
    "COURSETRACKR_SERVER_PORT",
    "COURSETRACKR_SERVER_CORS_ORIGIN",
    "COURSETRACKR_SERVER_PUBLIC_URL",
    "COURSETRACKR_DATABASE_DRIVER",
    "COURSETRACKR_DATABASE_URL",
    "COURSETRACKR_CACHE_TTL_SECONDS",
    "COURSETRACKR_AUTH_JWT_SECRET",
    "COURSETRACKR_AUTH_TOKEN_TTL_HOURS",
    "COURSETRACKR_RATE_LIMIT_MAX_REQUESTS",
    "COURSETRACKR_RATE_LIMIT_WINDOW_SECONDS",
    "COURSETRACKR_EMAIL_ENABLED",
    "COURSETRACKR_EMAIL_SMTP_HOST",
    "COURSETRACKR_EMAIL_SMTP_PORT",
    "COURSETRACKR_EMAIL_SMTP_USERNAME",
    "COURSETRACKR_EMAIL_SMTP_PASSWORD",
    "COURSETRACKR_EMAIL_FROM_ADDRESS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
