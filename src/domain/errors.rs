use crate::domain::transaction::ModelKind;
use thiserror::Error;

/// Errors raised at the scoring-service boundary.
///
/// These are the only failures in the crate; local derivations are total.
#[derive(Debug, Clone, Error)]
pub enum ScoringError {
    #[error("Transport failure calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Scoring service returned status {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Scoring service unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors surfaced by dashboard sessions and controllers.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Initial load for model {model} failed: {source}")]
    InitialLoad {
        model: ModelKind,
        #[source]
        source: ScoringError,
    },

    #[error("Switching model {from} -> {to} failed: {source}")]
    ModelSwitch {
        from: ModelKind,
        to: ModelKind,
        #[source]
        source: ScoringError,
    },

    #[error("Comparison load failed: {source}")]
    ComparisonLoad {
        #[source]
        source: ScoringError,
    },

    #[error("Invalid threshold: {value}")]
    InvalidThreshold { value: f64 },

    #[error("Unknown transaction: {id}")]
    UnknownTransaction { id: String },

    #[error("Duplicate transaction id: {id}")]
    DuplicateTransaction { id: String },

    #[error("Transaction {id} has {field} out of range: {value}")]
    InvalidTransaction {
        id: String,
        field: &'static str,
        value: f64,
    },

    #[error("Unknown model: {name}. Must be 'xgboost' or 'tensorflow'")]
    UnknownModel { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_formatting() {
        let error = ScoringError::Status {
            endpoint: "/model/evaluate".to_string(),
            status: 503,
            body: "busy".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("/model/evaluate"));
        assert!(msg.contains("busy"));
    }

    #[test]
    fn test_initial_load_keeps_source() {
        let error = DashboardError::InitialLoad {
            model: ModelKind::Tensorflow,
            source: ScoringError::Unavailable {
                reason: "connection refused".to_string(),
            },
        };

        let msg = error.to_string();
        assert!(msg.contains("tensorflow"));
        assert!(msg.contains("connection refused"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
