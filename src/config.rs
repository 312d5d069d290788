//! Runtime configuration for the ledger store and executor.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:arca.db?mode=rwc";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// sqlx SQLite connection URL
    pub database_url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// How long a writer waits for the database write lock before failing
    pub busy_timeout: Duration,

    /// Deadline for a whole unit of work. `None` disables it.
    pub operation_timeout: Option<Duration>,
}

impl LedgerConfig {
    /// Configuration for a database file at `path`, created on first use.
    pub fn sqlite_file(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// - `ARCA_DATABASE_URL` (default: `sqlite:arca.db?mode=rwc`)
    /// - `ARCA_MAX_CONNECTIONS` (default: 10)
    /// - `ARCA_BUSY_TIMEOUT_MS` (default: 5000)
    /// - `ARCA_OPERATION_TIMEOUT_MS` (default: unset; 0 also disables it)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let busy_timeout_ms: u64 = parse_var(&lookup, "ARCA_BUSY_TIMEOUT_MS")?
            .unwrap_or(defaults.busy_timeout.as_millis() as u64);
        let operation_timeout_ms: Option<u64> = parse_var(&lookup, "ARCA_OPERATION_TIMEOUT_MS")?;

        Ok(Self {
            database_url: lookup("ARCA_DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var(&lookup, "ARCA_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            operation_timeout: operation_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        })
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
            busy_timeout: Duration::from_secs(5),
            operation_timeout: None,
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
