//! Scoring service connection settings.

use super::{Lookup, parse_or};
use anyhow::Result;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringEnvConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ScoringEnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ScoringEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        let api_url = lookup("SCORING_API_URL").unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            anyhow::bail!(
                "Invalid SCORING_API_URL: {}. Must start with http:// or https://",
                api_url
            );
        }

        let timeout_secs = parse_or(lookup, "SCORING_TIMEOUT_SECS", defaults.timeout_secs)?;
        if timeout_secs == 0 {
            anyhow::bail!("SCORING_TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            api_url,
            timeout_secs,
            max_retries: parse_or(lookup, "SCORING_MAX_RETRIES", defaults.max_retries)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::lookup_from;

    #[test]
    fn test_scoring_config_defaults() {
        let config = ScoringEnvConfig::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config, ScoringEnvConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_scoring_config_rejects_bad_values() {
        let bad_url = lookup_from(&[("SCORING_API_URL", "localhost:8000")]);
        assert!(ScoringEnvConfig::from_lookup(&bad_url).is_err());

        let zero_timeout = lookup_from(&[("SCORING_TIMEOUT_SECS", "0")]);
        assert!(ScoringEnvConfig::from_lookup(&zero_timeout).is_err());

        let bad_retries = lookup_from(&[("SCORING_MAX_RETRIES", "many")]);
        let err = ScoringEnvConfig::from_lookup(&bad_retries).unwrap_err();
        assert!(err.to_string().contains("SCORING_MAX_RETRIES"));
    }
}
