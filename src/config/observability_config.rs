//! Observability configuration parsing from environment variables.

use super::Lookup;

/// Observability environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityEnvConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            metrics_enabled: lookup("METRICS_ENABLED")
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(true),
        }
    }
}
