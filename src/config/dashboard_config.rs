//! Dashboard behaviour: initial threshold, debounce window, list sizes, model.

use super::{Lookup, parse_or};
use crate::domain::aggregation::TOP_RISK_LIMIT;
use crate::domain::transaction::ModelKind;
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardEnvConfig {
    pub initial_threshold: f64,
    pub debounce_ms: u64,
    pub top_risk_limit: usize,
    pub model: ModelKind,
}

impl Default for DashboardEnvConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 0.55,
            debounce_ms: 150,
            top_risk_limit: TOP_RISK_LIMIT,
            model: ModelKind::default(),
        }
    }
}

impl DashboardEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        let initial_threshold = parse_or(lookup, "INITIAL_THRESHOLD", defaults.initial_threshold)?;
        if !(0.0..=1.0).contains(&initial_threshold) {
            anyhow::bail!(
                "INITIAL_THRESHOLD must be between 0 and 1, got {}",
                initial_threshold
            );
        }

        let model = match lookup("MODEL") {
            Some(raw) => raw
                .parse::<ModelKind>()
                .context("Failed to parse MODEL")?,
            None => defaults.model,
        };

        Ok(Self {
            initial_threshold,
            debounce_ms: parse_or(lookup, "THRESHOLD_DEBOUNCE_MS", defaults.debounce_ms)?,
            top_risk_limit: parse_or(lookup, "TOP_RISK_LIMIT", defaults.top_risk_limit)?,
            model,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::lookup_from;

    #[test]
    fn test_dashboard_config_defaults() {
        let config = DashboardEnvConfig::from_lookup(&lookup_from(&[])).unwrap();
        assert_eq!(config.initial_threshold, 0.55);
        assert_eq!(config.debounce(), Duration::from_millis(150));
        assert_eq!(config.top_risk_limit, 15);
        assert_eq!(config.model, ModelKind::Xgboost);
    }

    #[test]
    fn test_dashboard_config_overrides() {
        let lookup = lookup_from(&[
            ("INITIAL_THRESHOLD", "0.7"),
            ("THRESHOLD_DEBOUNCE_MS", "300"),
            ("MODEL", "TensorFlow"),
        ]);
        let config = DashboardEnvConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.initial_threshold, 0.7);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.model, ModelKind::Tensorflow);
    }

    #[test]
    fn test_dashboard_config_rejects_bad_values() {
        let out_of_range = lookup_from(&[("INITIAL_THRESHOLD", "1.5")]);
        assert!(DashboardEnvConfig::from_lookup(&out_of_range).is_err());

        let unknown_model = lookup_from(&[("MODEL", "lightgbm")]);
        let err = DashboardEnvConfig::from_lookup(&unknown_model).unwrap_err();
        assert!(err.to_string().contains("MODEL"));
    }
}
