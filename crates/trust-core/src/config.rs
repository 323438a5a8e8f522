//! Configuration types for the trust ledger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Severity;

/// Main configuration for the trust ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Hashing configuration.
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Vector ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Reputation scoring configuration.
    #[serde(default)]
    pub reputation: ReputationConfig,

    /// Filesystem watchdog configuration.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Enable WAL mode (recommended).
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
            busy_timeout_ms: 30000,
        }
    }
}

/// Hashing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Default algorithm name. Unknown names fall back to SHA-256.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            default_algorithm: default_algorithm(),
        }
    }
}

/// Vector ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Default number of events returned by history queries.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
        }
    }
}

/// Reputation scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Power-iteration rounds per recompute.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Fraction of score forwarded along edges each round.
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Default leaderboard size.
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            damping: 0.85,
            leaderboard_limit: 10,
        }
    }
}

/// Filesystem watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Directory tree to fingerprint.
    #[serde(default = "default_watch_root")]
    pub root: PathBuf,

    /// Directory names skipped in addition to the built-in set.
    #[serde(default)]
    pub extra_ignored_dirs: Vec<String>,

    /// Include dot-files and dot-directories.
    #[serde(default)]
    pub include_hidden: bool,

    /// Severity assigned to change alerts.
    #[serde(default)]
    pub alert_severity: Severity,

    /// Alert webhook URL. No delivery when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            root: default_watch_root(),
            extra_ignored_dirs: Vec::new(),
            include_hidden: false,
            alert_severity: Severity::Medium,
            webhook_url: None,
            webhook_timeout_secs: 10,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u32 {
    30000
}

fn default_algorithm() -> String {
    "SHA-256".to_string()
}

fn default_history_limit() -> u32 {
    100
}

fn default_iterations() -> u32 {
    20
}

fn default_damping() -> f64 {
    0.85
}

fn default_leaderboard_limit() -> u32 {
    10
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_watch_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trust-ledger")
        .join("ledger.db")
}

impl TrustConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| {
            crate::error::TrustError::config(format!("Failed to parse config: {}", e))
        })
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("trust-ledger").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("trust-ledger.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> crate::error::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> crate::error::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(algo) = lookup("TRUST_HASH_ALGO") {
            self.hashing.default_algorithm = algo;
        }
        if let Some(damping) = lookup("REP_DAMPING") {
            self.reputation.damping = damping.parse().map_err(|_| {
                crate::error::TrustError::config(format!("REP_DAMPING is not a number: {}", damping))
            })?;
        }
        if let Some(iterations) = lookup("REP_ITERATIONS") {
            self.reputation.iterations = iterations.parse().map_err(|_| {
                crate::error::TrustError::config(format!(
                    "REP_ITERATIONS is not an integer: {}",
                    iterations
                ))
            })?;
        }
        if let Some(root) = lookup("WATCHDOG_ROOT") {
            self.watchdog.root = PathBuf::from(root);
        }
        if let Some(url) = lookup("ALERT_WEBHOOK_URL") {
            self.watchdog.webhook_url = if url.is_empty() { None } else { Some(url) };
        }
        Ok(())
    }
}
