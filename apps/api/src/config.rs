use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::rewrite::{DispatchOptions, Eligibility, FailurePolicy};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REWRITE_CONCURRENCY: usize = 4;
const DEFAULT_REWRITE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("ENVIRONMENT must be 'development' or 'production', got '{other}'"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is present but invalid.
#[derive(Clone)]
pub struct Config {
    /// Absent ⇒ the identity rewriter is used (degraded mode).
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub environment: Environment,
    pub rewrite_concurrency: usize,
    pub rewrite_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("environment", &self.environment)
            .field("rewrite_concurrency", &self.rewrite_concurrency)
            .field("rewrite_timeout", &self.rewrite_timeout)
            .field("failure_policy", &self.failure_policy)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rewrite_concurrency: usize = parse_or(
            var("REWRITE_CONCURRENCY"),
            "REWRITE_CONCURRENCY",
            DEFAULT_REWRITE_CONCURRENCY,
        )?;
        if rewrite_concurrency == 0 {
            bail!("REWRITE_CONCURRENCY must be at least 1");
        }

        let failure_policy = match var("REWRITE_FAILURE_POLICY") {
            Some(raw) => raw
                .parse::<FailurePolicy>()
                .map_err(anyhow::Error::msg)
                .context("REWRITE_FAILURE_POLICY is invalid")?,
            None => FailurePolicy::default(),
        };

        Ok(Config {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            environment: match var("ENVIRONMENT") {
                Some(raw) => raw.parse()?,
                None => Environment::Development,
            },
            rewrite_concurrency,
            rewrite_timeout: Duration::from_secs(parse_or(
                var("REWRITE_TIMEOUT_SECS"),
                "REWRITE_TIMEOUT_SECS",
                DEFAULT_REWRITE_TIMEOUT_SECS,
            )?),
            failure_policy,
            max_upload_bytes: parse_or(
                var("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        })
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            eligibility: Eligibility::default(),
            max_concurrency: self.rewrite_concurrency,
            call_timeout: self.rewrite_timeout,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
