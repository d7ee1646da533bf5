use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub db_busy_timeout: Duration,

    // Rate limiting
    pub rate_device_per_min: u32,
    pub rate_protected_per_min: u32,

    /// How long a verified device API key stays trusted without re-hashing
    pub device_cache_ttl: Duration,
    /// Period of the background stale-session reconciliation
    pub reconcile_interval: Duration,

    pub log_dir: String,
    pub log_level: tracing::Level,

    pub api_prefix: String,
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 5)?,
            db_busy_timeout: Duration::from_secs(parsed_or("DB_BUSY_TIMEOUT_SECS", 5)?),

            rate_device_per_min: parsed_or("RATE_DEVICE_PER_MIN", 600)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            device_cache_ttl: Duration::from_secs(parsed_or("DEVICE_CACHE_TTL_SECS", 300)?),
            reconcile_interval: Duration::from_secs(parsed_or("RECONCILE_INTERVAL_SECS", 3600)?),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed_or("LOG_LEVEL", tracing::Level::DEBUG)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }
        if self.rate_device_per_min == 0 || self.rate_protected_per_min == 0 {
            bail!("rate limits must be greater than zero");
        }
        if self.reconcile_interval.is_zero() {
            bail!("RECONCILE_INTERVAL_SECS must be greater than zero");
        }
        if self.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }
        Ok(())
    }

    /// Settings used by the in-process test suites.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-with-enough-length".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            db_max_connections: 1,
            db_busy_timeout: Duration::from_secs(5),
            rate_device_per_min: 10_000,
            rate_protected_per_min: 10_000,
            device_cache_ttl: Duration::from_secs(60),
            reconcile_interval: Duration::from_secs(3600),
            log_dir: "logs".to_string(),
            log_level: tracing::Level::DEBUG,
            api_prefix: "/api".to_string(),
        }
    }
}
