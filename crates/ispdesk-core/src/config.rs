//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub registrar: RegistrarConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply embedded migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_run_migrations() -> bool {
    true
}

/// Pricing engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// Currency margins and registrar rankings are expressed in
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Margins below this percentage are flagged as low
    #[serde(default = "default_low_margin_percent")]
    pub low_margin_percent: rust_decimal::Decimal,

    /// Closed rows older than this many days are archived
    #[serde(default = "default_archive_after_days")]
    pub archive_after_days: i64,

    /// How often the archival job runs, in seconds
    #[serde(default = "default_archive_interval")]
    pub archive_interval_secs: u64,

    /// Upper bound on the number of years a quote can cover
    #[serde(default = "default_max_quote_years")]
    pub max_quote_years: u32,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_low_margin_percent() -> rust_decimal::Decimal {
    rust_decimal::Decimal::from(10)
}

fn default_archive_after_days() -> i64 {
    365
}

fn default_archive_interval() -> u64 {
    86_400
}

fn default_max_quote_years() -> u32 {
    10
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            low_margin_percent: default_low_margin_percent(),
            archive_after_days: default_archive_after_days(),
            archive_interval_secs: default_archive_interval(),
            max_quote_years: default_max_quote_years(),
        }
    }
}

/// Registrar API and price sync configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RegistrarConfig {
    /// How often the price sync job wakes up, in seconds
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Timeout for registrar API requests in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Per-registrar API connection settings, keyed by registrar code
    #[serde(default)]
    pub clients: HashMap<String, RegistrarClientConfig>,
}

fn default_sync_interval() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval(),
            request_timeout_ms: default_request_timeout(),
            clients: HashMap::new(),
        }
    }
}

/// Connection settings for one registrar API
#[derive(Debug, Deserialize, Clone)]
pub struct RegistrarClientConfig {
    /// Base URL of the registrar's REST API
    pub base_url: String,

    /// API key sent as a bearer token
    pub api_key: Option<String>,
}

/// Outbound email queue configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Capacity of the in-memory notification channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Delivery attempts before an email is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// How often the worker polls for due retries, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum number of due emails processed per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Seconds a claimed email stays reserved before another claim may take it
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: i64,

    /// HTTP relay that performs the actual delivery (None = log only)
    pub relay_url: Option<String>,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

fn default_channel_capacity() -> usize {
    100
}

fn default_max_attempts() -> i32 {
    5
}

fn default_poll_interval() -> u64 {
    60
}

fn default_batch_size() -> i64 {
    20
}

fn default_claim_timeout() -> i64 {
    300
}

fn default_from_address() -> String {
    "noreply@ispdesk.local".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            claim_timeout_secs: default_claim_timeout(),
            relay_url: None,
            from_address: default_from_address(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", true)?
            .set_default("pricing.base_currency", "USD")?
            .set_default("pricing.archive_after_days", 365)?
            .set_default("registrar.sync_interval_secs", 3600)?
            .set_default("registrar.request_timeout_ms", 30_000)?
            .set_default("email.channel_capacity", 100)?
            .set_default("email.max_attempts", 5)?
            .set_default("email.poll_interval_secs", 60)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with ISPDESK_ prefix
            .add_source(
                Environment::with_prefix("ISPDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain DATABASE_URL overrides everything above
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("ISPDESK").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
