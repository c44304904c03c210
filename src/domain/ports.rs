use crate::domain::curves::RocPoint;
use crate::domain::errors::ScoringError;
use crate::domain::explanation::{Explanation, FeatureImportance};
use crate::domain::metrics::ModelMetrics;
use crate::domain::transaction::{ModelKind, TransactionsResponse};
use async_trait::async_trait;

/// The external scoring service. Every call is a network round-trip and may fail.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn fetch_transactions(&self, model: ModelKind)
    -> Result<TransactionsResponse, ScoringError>;

    async fn evaluate(&self, model: ModelKind, threshold: f64)
    -> Result<ModelMetrics, ScoringError>;

    /// Threshold sweep with rates already computed upstream.
    async fn fetch_curve(&self, model: ModelKind) -> Result<Vec<RocPoint>, ScoringError>;

    async fn fetch_feature_importance(
        &self,
        model: ModelKind,
    ) -> Result<Vec<FeatureImportance>, ScoringError>;

    async fn fetch_explanation(
        &self,
        transaction_id: &str,
        model: ModelKind,
    ) -> Result<Explanation, ScoringError>;
}
