//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml. The endpoint, cutoff and report
//! path are fixed at build time; only `RUST_LOG` overrides the log level.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use url::Url;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub audit: AuditConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

/// Platform API endpoints and paging.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub accounts_path: String,
    pub audit_logs_path: String,
    pub page_size: usize,
    pub page_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ApiConfig {
    /// Pause observed between two page requests.
    pub fn page_interval(&self) -> Duration {
        Duration::from_millis(self.page_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Backoff policy for rate-limited and transient failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub inactivity_days: i64,
    pub retention_days: i64,
    pub login_category: String,
}

impl AuditConfig {
    /// Instant before which a login is considered stale.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(self.inactivity_days)
    }

    /// Oldest instant the platform still holds audit logs for.
    pub fn retention_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(self.retention_days)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub error_log: PathBuf,
}

impl Config {
    /// Load configuration from embedded config.toml with the `RUST_LOG` override.
    pub fn load() -> Result<Self> {
        let mut config: Config =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is usable.
    fn validate(&self) -> Result<()> {
        Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.api.page_size == 0 {
            anyhow::bail!("api.page_size must be greater than zero");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            );
        }

        if self.audit.inactivity_days <= 0 {
            anyhow::bail!("audit.inactivity_days must be positive");
        }

        if self.audit.inactivity_days > self.audit.retention_days {
            anyhow::bail!(
                "audit.inactivity_days ({}) cannot exceed the {}-day log retention window",
                self.audit.inactivity_days,
                self.audit.retention_days
            );
        }

        Ok(())
    }
}
