//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{DEFAULT_STOCK_RECIPIENT, RetryPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string (default: unset, in-memory store)
/// - `ALLOCATE_MAX_ATTEMPTS`: attempts per allocation (default: `3`)
/// - `ALLOCATE_RETRY_DELAY_MS`: base delay between attempts (default: `25`)
/// - `ALLOCATE_TIMEOUT_MS`: bound on a single attempt (default: `2000`)
/// - `OUT_OF_STOCK_NOTIFY`: recipient of out-of-stock notices (default: `"stock@made.com"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub allocate_max_attempts: u32,
    pub allocate_retry_delay_ms: u64,
    pub allocate_timeout_ms: u64,
    pub out_of_stock_notify: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            allocate_max_attempts: env_or("ALLOCATE_MAX_ATTEMPTS", defaults.allocate_max_attempts),
            allocate_retry_delay_ms: env_or(
                "ALLOCATE_RETRY_DELAY_MS",
                defaults.allocate_retry_delay_ms,
            ),
            allocate_timeout_ms: env_or("ALLOCATE_TIMEOUT_MS", defaults.allocate_timeout_ms),
            out_of_stock_notify: std::env::var("OUT_OF_STOCK_NOTIFY")
                .unwrap_or(defaults.out_of_stock_notify),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for allocation requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.allocate_max_attempts.max(1),
            base_delay: Duration::from_millis(self.allocate_retry_delay_ms),
            timeout: Duration::from_millis(self.allocate_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            allocate_max_attempts: 3,
            allocate_retry_delay_ms: 25,
            allocate_timeout_ms: 2000,
            out_of_stock_notify: DEFAULT_STOCK_RECIPIENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.out_of_stock_notify, "stock@made.com");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_retry_policy_defaults_match_domain() {
        assert_eq!(Config::default().retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_retry_policy_makes_at_least_one_attempt() {
        let config = Config {
            allocate_max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
