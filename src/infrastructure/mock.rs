use crate::domain::curves::RocPoint;
use crate::domain::errors::ScoringError;
use crate::domain::explanation::{Explanation, FeatureImportance};
use crate::domain::metrics::{self, ConfusionMatrix, ModelMetrics, round_to};
use crate::domain::ports::ScoringService;
use crate::domain::transaction::{ModelKind, Transaction, TransactionsResponse};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Number of steps in the upstream threshold sweep (0.00, 0.05, ..., 1.00).
pub const SWEEP_STEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockEndpoint {
    Transactions,
    Evaluate,
    Curve,
    FeatureImportance,
    Explanation,
}

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Transactions { model: ModelKind },
    Evaluate { model: ModelKind, threshold: f64 },
    Curve { model: ModelKind },
    FeatureImportance { model: ModelKind },
    Explanation { transaction_id: String, model: ModelKind },
}

impl MockCall {
    pub fn endpoint(&self) -> MockEndpoint {
        match self {
            Self::Transactions { .. } => MockEndpoint::Transactions,
            Self::Evaluate { .. } => MockEndpoint::Evaluate,
            Self::Curve { .. } => MockEndpoint::Curve,
            Self::FeatureImportance { .. } => MockEndpoint::FeatureImportance,
            Self::Explanation { .. } => MockEndpoint::Explanation,
        }
    }

    pub fn model(&self) -> ModelKind {
        match self {
            Self::Transactions { model }
            | Self::Evaluate { model, .. }
            | Self::Curve { model }
            | Self::FeatureImportance { model }
            | Self::Explanation { model, .. } => *model,
        }
    }
}

type LatencyFn = Box<dyn Fn(&MockCall) -> Duration + Send + Sync>;

/// In-process scoring service over fixed per-model datasets.
///
/// Evaluations and sweeps are computed the way the real scorer does them.
/// Explanations and importances are whatever the caller registered.
pub struct MockScoringService {
    datasets: HashMap<ModelKind, Vec<Transaction>>,
    importances: HashMap<ModelKind, Vec<FeatureImportance>>,
    explanations: HashMap<(String, ModelKind), Explanation>,
    latency: Option<LatencyFn>,
    failures: Mutex<HashSet<(MockEndpoint, Option<ModelKind>)>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockScoringService {
    pub fn new() -> Self {
        Self {
            datasets: HashMap::new(),
            importances: HashMap::new(),
            explanations: HashMap::new(),
            latency: None,
            failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transactions(mut self, model: ModelKind, transactions: Vec<Transaction>) -> Self {
        self.datasets.insert(model, transactions);
        self
    }

    pub fn with_feature_importance(
        mut self,
        model: ModelKind,
        importances: Vec<FeatureImportance>,
    ) -> Self {
        self.importances.insert(model, importances);
        self
    }

    pub fn with_explanation(
        mut self,
        transaction_id: &str,
        model: ModelKind,
        explanation: Explanation,
    ) -> Self {
        self.explanations
            .insert((transaction_id.to_string(), model), explanation);
        self
    }

    /// Per-request delay, decided from the request itself.
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&MockCall) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    /// Make every request to `endpoint` fail until `recover` is called.
    pub fn fail(&self, endpoint: MockEndpoint) {
        lock(&self.failures).insert((endpoint, None));
    }

    /// Fail `endpoint` for one model only.
    pub fn fail_model(&self, endpoint: MockEndpoint, model: ModelKind) {
        lock(&self.failures).insert((endpoint, Some(model)));
    }

    pub fn recover(&self, endpoint: MockEndpoint) {
        lock(&self.failures).retain(|(e, _)| *e != endpoint);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn evaluations(&self) -> Vec<(ModelKind, f64)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                MockCall::Evaluate { model, threshold } => Some((*model, *threshold)),
                _ => None,
            })
            .collect()
    }

    pub fn explanation_requests(&self) -> Vec<(String, ModelKind)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                MockCall::Explanation {
                    transaction_id,
                    model,
                } => Some((transaction_id.clone(), *model)),
                _ => None,
            })
            .collect()
    }

    fn dataset(&self, model: ModelKind) -> &[Transaction] {
        self.datasets.get(&model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record, wait, then fail if the endpoint is switched off.
    async fn enter(&self, call: MockCall) -> Result<(), ScoringError> {
        lock(&self.calls).push(call.clone());

        if let Some(latency) = &self.latency {
            let delay = latency(&call);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let endpoint = call.endpoint();
        let failing = {
            let failures = lock(&self.failures);
            failures.contains(&(endpoint, None))
                || failures.contains(&(endpoint, Some(call.model())))
        };
        if failing {
            debug!(?call, "MockScoringService: injected failure");
            return Err(ScoringError::Unavailable {
                reason: format!("injected failure for {:?}", endpoint),
            });
        }
        Ok(())
    }
}

impl Default for MockScoringService {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Threshold sweep the way the scoring service produces it: `steps + 1`
/// evenly spaced thresholds, fpr/tpr to 3 places, other rates to 4.
pub fn threshold_sweep(transactions: &[Transaction], steps: usize) -> Vec<RocPoint> {
    if steps == 0 {
        return Vec::new();
    }
    (0..=steps)
        .map(|i| {
            let threshold = round_to(i as f64 / steps as f64, 2);
            let confusion = ConfusionMatrix::from_transactions(transactions, threshold);
            let m = ModelMetrics::from_confusion(confusion).rounded(4);
            RocPoint {
                threshold,
                fpr: round_to(confusion.fpr(), 3),
                tpr: round_to(confusion.tpr(), 3),
                precision: m.precision,
                recall: m.recall,
                f1: m.f1,
            }
        })
        .collect()
}

#[async_trait]
impl ScoringService for MockScoringService {
    async fn fetch_transactions(
        &self,
        model: ModelKind,
    ) -> Result<TransactionsResponse, ScoringError> {
        self.enter(MockCall::Transactions { model }).await?;
        let transactions = self.dataset(model).to_vec();
        let total_fraud = transactions.iter().filter(|t| t.is_fraud).count();
        Ok(TransactionsResponse {
            transactions,
            total_fraud,
        })
    }

    async fn evaluate(
        &self,
        model: ModelKind,
        threshold: f64,
    ) -> Result<ModelMetrics, ScoringError> {
        self.enter(MockCall::Evaluate { model, threshold }).await?;
        Ok(metrics::evaluate(self.dataset(model), threshold).rounded(4))
    }

    async fn fetch_curve(&self, model: ModelKind) -> Result<Vec<RocPoint>, ScoringError> {
        self.enter(MockCall::Curve { model }).await?;
        Ok(threshold_sweep(self.dataset(model), SWEEP_STEPS))
    }

    async fn fetch_feature_importance(
        &self,
        model: ModelKind,
    ) -> Result<Vec<FeatureImportance>, ScoringError> {
        self.enter(MockCall::FeatureImportance { model }).await?;
        Ok(self.importances.get(&model).cloned().unwrap_or_default())
    }

    async fn fetch_explanation(
        &self,
        transaction_id: &str,
        model: ModelKind,
    ) -> Result<Explanation, ScoringError> {
        self.enter(MockCall::Explanation {
            transaction_id: transaction_id.to_string(),
            model,
        })
        .await?;
        self.explanations
            .get(&(transaction_id.to_string(), model))
            .cloned()
            .ok_or_else(|| ScoringError::NotFound {
                resource: format!("explanation for {} ({})", transaction_id, model),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::fixtures::txn;
    use tokio_test::{assert_err, assert_ok};

    fn dataset() -> Vec<Transaction> {
        vec![
            txn("A", 0.8, true),
            txn("B", 0.3, false),
            txn("C", 0.6, true),
            txn("D", 0.65, false),
        ]
    }

    #[test]
    fn test_sweep_shape() {
        let sweep = threshold_sweep(&dataset(), SWEEP_STEPS);
        assert_eq!(sweep.len(), 21);
        assert_eq!(sweep[0].threshold, 0.0);
        assert_eq!(sweep[1].threshold, 0.05);
        assert_eq!(sweep[20].threshold, 1.0);

        // Everything flagged at 0 and nothing at 1
        assert_eq!((sweep[0].fpr, sweep[0].tpr), (1.0, 1.0));
        assert_eq!((sweep[20].fpr, sweep[20].tpr), (0.0, 0.0));
        assert!(threshold_sweep(&[], 0).is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_matches_local_metrics() {
        let service = MockScoringService::new().with_transactions(ModelKind::Xgboost, dataset());
        let remote = assert_ok!(service.evaluate(ModelKind::Xgboost, 0.5).await);
        let local = metrics::evaluate(&dataset(), 0.5);

        assert_eq!(remote.confusion, local.confusion);
        assert_eq!(service.evaluations(), vec![(ModelKind::Xgboost, 0.5)]);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_empty() {
        let service = MockScoringService::new();
        let response = assert_ok!(service.fetch_transactions(ModelKind::Tensorflow).await);
        assert!(response.transactions.is_empty());
        assert_eq!(response.total_fraud, 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_scoped() {
        let service = MockScoringService::new().with_transactions(ModelKind::Xgboost, dataset());
        service.fail_model(MockEndpoint::Curve, ModelKind::Tensorflow);

        assert_ok!(service.fetch_curve(ModelKind::Xgboost).await);
        assert_err!(service.fetch_curve(ModelKind::Tensorflow).await);

        service.recover(MockEndpoint::Curve);
        assert_ok!(service.fetch_curve(ModelKind::Tensorflow).await);
        assert_eq!(service.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let service = MockScoringService::new()
            .with_latency(|call| match call.endpoint() {
                MockEndpoint::Evaluate => Duration::from_millis(300),
                _ => Duration::ZERO,
            });

        let started = tokio::time::Instant::now();
        assert_ok!(service.evaluate(ModelKind::Xgboost, 0.4).await);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
