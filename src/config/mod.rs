//! Configuration module for fraudlens.
//!
//! Settings are loaded from environment variables (and `.env`), organized by
//! concern: scoring service, dashboard behaviour, and observability.

mod dashboard_config;
mod observability_config;
mod scoring_config;

pub use dashboard_config::DashboardEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use scoring_config::{DEFAULT_API_URL, ScoringEnvConfig};

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Source of raw settings by key.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Parse `key` if present, otherwise return `default`.
fn parse_or<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub scoring: ScoringEnvConfig,
    pub dashboard: DashboardEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from the process environment, after `.env`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key source.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            scoring: ScoringEnvConfig::from_lookup(lookup)
                .context("Failed to load scoring config")?,
            dashboard: DashboardEnvConfig::from_lookup(lookup)
                .context("Failed to load dashboard config")?,
            observability: ObservabilityEnvConfig::from_lookup(lookup),
        })
    }
}
