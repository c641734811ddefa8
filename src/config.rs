//! Configuration management for donate-server
//!
//! Configuration is loaded from TOML files, with secrets overridable from
//! environment variables.
//!
//! # Example Configuration File
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8080"
//!
//! [database]
//! url = "sqlite:donate.db"
//!
//! [payment]
//! server_key = "SB-Mid-server-xxxx"
//!
//! [jobs]
//! cron_secret = "change-me"
//! archive_threshold_hours = 72
//!
//! [payout]
//! minimum_amount = 50000
//! balance_policy = "gross"
//!
//! [relay]
//! url = "http://127.0.0.1:3001"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment gateway configuration
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Cron job configuration
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Leaderboard configuration
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// Payout configuration
    #[serde(default)]
    pub payout: PayoutConfig,

    /// Socket relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Overlay configuration
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Admin API configuration
    #[serde(default)]
    pub admin: AdminConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the API server to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            enable_cors: true,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL or path
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Directory relative database paths are resolved against
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:donate.db".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("donate-server"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Gateway server key, used to verify webhook signatures
    #[serde(default)]
    pub server_key: String,

    /// Smallest accepted donation amount
    #[serde(default = "default_min_donation")]
    pub min_donation: i64,

    /// Longest accepted donor message, in characters
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            min_donation: default_min_donation(),
            max_message_len: default_max_message_len(),
        }
    }
}

fn default_min_donation() -> i64 {
    1
}

fn default_max_message_len() -> usize {
    255
}

/// Cron job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Shared secret expected in the `x-cron-secret` header
    pub cron_secret: Option<String>,

    /// Age after which terminal records are archived
    #[serde(default = "default_archive_threshold_hours")]
    pub archive_threshold_hours: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            archive_threshold_hours: default_archive_threshold_hours(),
        }
    }
}

fn default_archive_threshold_hours() -> i64 {
    72
}

/// Leaderboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Number of donors kept on each monthly board
    #[serde(default = "default_top_donors")]
    pub top_donors: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_donors: default_top_donors(),
        }
    }
}

fn default_top_donors() -> usize {
    10
}

/// How the payable balance treats payouts that were already requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancePolicy {
    /// Sum of all PAID donations; earlier payouts are not subtracted
    #[default]
    Gross,
    /// PAID donations minus pending, approved and processed payouts
    Net,
}

/// Payout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Minimum balance and minimum request amount
    #[serde(default = "default_minimum_payout")]
    pub minimum_amount: i64,

    /// Balance computation policy
    #[serde(default)]
    pub balance_policy: BalancePolicy,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            minimum_amount: default_minimum_payout(),
            balance_policy: BalancePolicy::default(),
        }
    }
}

fn default_minimum_payout() -> i64 {
    50_000
}

/// Socket relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the socket relay (notifications are POSTed to `<url>/notify`)
    pub url: Option<String>,

    /// Relay request timeout in seconds
    #[serde(default = "default_relay_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_relay_timeout(),
        }
    }
}

fn default_relay_timeout() -> u64 {
    5
}

/// Overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Lifetime of a replay trigger in seconds
    #[serde(default = "default_replay_ttl")]
    pub replay_ttl_seconds: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            replay_ttl_seconds: default_replay_ttl(),
        }
    }
}

fn default_replay_ttl() -> u64 {
    30
}

/// Admin API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for admin routes; admin API is disabled when unset
    pub token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Resolve the database URL, making it relative to data_dir if needed
    pub fn resolve_database_url(&self) -> String {
        let url = &self.database.url;

        if url.starts_with("sqlite:/") || url == "sqlite::memory:" {
            return url.clone();
        }

        let path = url.strip_prefix("sqlite:").unwrap_or(url);

        if std::path::Path::new(path).is_absolute() {
            return url.clone();
        }

        let db_path = self.database.data_dir.join(path);
        format!("sqlite:{}", db_path.display())
    }

    /// Get the API bind address
    pub fn api_bind_address(&self) -> String {
        self.server.bind_address.clone()
    }

    /// Override secrets and endpoints from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DONATE_SERVER_KEY") {
            self.payment.server_key = v;
        }
        if let Some(v) = lookup("DONATE_CRON_SECRET") {
            self.jobs.cron_secret = Some(v);
        }
        if let Some(v) = lookup("DONATE_ADMIN_TOKEN") {
            self.admin.token = Some(v);
        }
        if let Some(v) = lookup("DONATE_RELAY_URL") {
            self.relay.url = Some(v);
        }
        if let Some(v) = lookup("DONATE_DATABASE_URL") {
            self.database.url = v;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.payment.server_key.is_empty() {
            return Err("payment.server_key must be set (or DONATE_SERVER_KEY)".to_string());
        }

        if self.payment.min_donation < 1 {
            return Err("payment.min_donation must be at least 1".to_string());
        }

        if self.payout.minimum_amount < 1 {
            return Err("payout.minimum_amount must be at least 1".to_string());
        }

        if self.jobs.archive_threshold_hours < 1 {
            return Err("jobs.archive_threshold_hours must be at least 1".to_string());
        }

        if self.leaderboard.top_donors == 0 {
            return Err("leaderboard.top_donors cannot be 0".to_string());
        }

        if let Some(url) = &self.relay.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("Invalid relay url: {}", url));
            }
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.payout.minimum_amount, 50_000);
        assert_eq!(config.payout.balance_policy, BalancePolicy::Gross);
        assert_eq!(config.leaderboard.top_donors, 10);
        assert!(config.jobs.cron_secret.is_none());
    }

    #[test]
    fn test_validate_config() {
        let mut config = Config::default();
        // No server key
        assert!(config.validate().is_err());

        config.payment.server_key = "secret".to_string();
        assert!(config.validate().is_ok());

        config.relay.url = Some("ftp://relay".to_string());
        assert!(config.validate().is_err());

        config.relay.url = Some("http://relay:3001".to_string());
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [payment]
            server_key = "abc"

            [payout]
            minimum_amount = 10000
            balance_policy = "net"

            [jobs]
            cron_secret = "cron"
            "#,
        )
        .unwrap();

        assert_eq!(config.payment.server_key, "abc");
        assert_eq!(config.payout.minimum_amount, 10_000);
        assert_eq!(config.payout.balance_policy, BalancePolicy::Net);
        assert_eq!(config.jobs.cron_secret.as_deref(), Some("cron"));
        assert_eq!(config.jobs.archive_threshold_hours, 72);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "DONATE_SERVER_KEY" => Some("from-env".to_string()),
            "DONATE_CRON_SECRET" => Some("cron-env".to_string()),
            _ => None,
        });
        assert_eq!(config.payment.server_key, "from-env");
        assert_eq!(config.jobs.cron_secret.as_deref(), Some("cron-env"));
        assert!(config.admin.token.is_none());
    }

    #[test]
    fn test_resolve_database_url() {
        let mut config = Config::default();
        config.database.data_dir = PathBuf::from("/var/lib/donate");
        assert_eq!(config.resolve_database_url(), "sqlite:/var/lib/donate/donate.db");

        config.database.url = "sqlite::memory:".to_string();
        assert_eq!(config.resolve_database_url(), "sqlite::memory:");
    }
}
