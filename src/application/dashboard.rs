//! Single-model dashboard state.
//!
//! A session owns the loaded transaction set and everything derived from it,
//! the threshold controller, and the explanation selector. Aggregates are
//! computed once per load; metrics follow the threshold.

use crate::application::explanation_selector::{ExplanationSelector, ExplanationView};
use crate::application::threshold_controller::{
    ControllerOptions, DEFAULT_DEBOUNCE, DEFAULT_THRESHOLD, ThresholdController,
    ThresholdEvaluator, ThresholdSnapshot, clamp_threshold,
};
use crate::config::Config;
use crate::domain::aggregation::{AggregateViews, TOP_RISK_LIMIT};
use crate::domain::curves::CurveSet;
use crate::domain::errors::{DashboardError, ScoringError};
use crate::domain::explanation::{FeatureImportance, max_importance, rank_importances};
use crate::domain::metrics::{self, ModelMetrics};
use crate::domain::ports::ScoringService;
use crate::domain::transaction::{ModelKind, Transaction, TransactionSet};
use crate::infrastructure::observability::DashboardMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Session tuning, usually built from [`Config`].
#[derive(Clone)]
pub struct DashboardSettings {
    pub initial_threshold: f64,
    pub debounce: Duration,
    pub top_risk_limit: usize,
    pub metrics: Option<DashboardMetrics>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE,
            top_risk_limit: TOP_RISK_LIMIT,
            metrics: None,
        }
    }
}

impl DashboardSettings {
    pub fn from_config(config: &Config, metrics: Option<DashboardMetrics>) -> Self {
        Self {
            initial_threshold: config.dashboard.initial_threshold,
            debounce: config.dashboard.debounce(),
            top_risk_limit: config.dashboard.top_risk_limit,
            metrics,
        }
    }

    pub(crate) fn controller_options(&self) -> ControllerOptions {
        ControllerOptions::new(self.debounce).with_metrics(self.metrics.clone())
    }
}

/// Evaluates one model remotely.
pub struct ModelEvaluator {
    service: Arc<dyn ScoringService>,
    model: ModelKind,
}

impl ModelEvaluator {
    pub fn new(service: Arc<dyn ScoringService>, model: ModelKind) -> Self {
        Self { service, model }
    }
}

#[async_trait]
impl ThresholdEvaluator for ModelEvaluator {
    type Output = ModelMetrics;

    async fn evaluate(&self, threshold: f64) -> Result<ModelMetrics, ScoringError> {
        self.service.evaluate(self.model, threshold).await
    }
}

/// Everything fetched and derived for one model.
struct LoadedModel {
    transactions: TransactionSet,
    aggregates: AggregateViews,
    curves: CurveSet,
    feature_importance: Vec<FeatureImportance>,
    initial_metrics: ModelMetrics,
}

async fn load_model(
    service: &Arc<dyn ScoringService>,
    model: ModelKind,
    threshold: f64,
    top_risk_limit: usize,
) -> Result<LoadedModel, ScoringError> {
    let (response, curve, importances, initial_metrics) = tokio::try_join!(
        service.fetch_transactions(model),
        service.fetch_curve(model),
        service.fetch_feature_importance(model),
        service.evaluate(model, threshold),
    )?;

    let transactions =
        TransactionSet::new(response.transactions).map_err(|e| ScoringError::Decode {
            endpoint: "transactions".to_string(),
            reason: e.to_string(),
        })?;
    if response.total_fraud != transactions.total_fraud() {
        warn!(
            %model,
            reported = response.total_fraud,
            counted = transactions.total_fraud(),
            "Fraud total disagrees with payload"
        );
    }

    Ok(LoadedModel {
        aggregates: AggregateViews::compute(transactions.as_slice(), top_risk_limit),
        transactions,
        curves: CurveSet::from_points(curve),
        feature_importance: rank_importances(importances),
        initial_metrics,
    })
}

pub struct DashboardSession {
    service: Arc<dyn ScoringService>,
    settings: DashboardSettings,
    model: ModelKind,
    transactions: TransactionSet,
    aggregates: AggregateViews,
    curves: CurveSet,
    feature_importance: Vec<FeatureImportance>,
    controller: ThresholdController<ModelEvaluator>,
    explanations: ExplanationSelector,
}

impl DashboardSession {
    /// Fetch transactions, curve, importances and the first evaluation in
    /// parallel. Any failure fails the whole load.
    pub async fn load(
        service: Arc<dyn ScoringService>,
        model: ModelKind,
        settings: DashboardSettings,
    ) -> Result<Self, DashboardError> {
        let threshold = clamp_threshold(settings.initial_threshold)?;
        info!(%model, threshold, "Loading dashboard");

        let loaded = load_model(&service, model, threshold, settings.top_risk_limit)
            .await
            .map_err(|source| {
                warn!(%model, error = %source, "Initial load failed");
                DashboardError::InitialLoad { model, source }
            })?;

        let controller = ThresholdController::new(
            ModelEvaluator::new(Arc::clone(&service), model),
            threshold,
            Some(loaded.initial_metrics),
            settings.controller_options(),
        );
        let explanations =
            ExplanationSelector::new(Arc::clone(&service), model, settings.metrics.clone());

        info!(
            %model,
            transactions = loaded.transactions.len(),
            fraud = loaded.transactions.total_fraud(),
            "Dashboard ready"
        );

        Ok(Self {
            service,
            settings,
            model,
            transactions: loaded.transactions,
            aggregates: loaded.aggregates,
            curves: loaded.curves,
            feature_importance: loaded.feature_importance,
            controller,
            explanations,
        })
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Current slider value, updated immediately on every change.
    pub fn threshold(&self) -> f64 {
        self.controller.threshold()
    }

    /// Store a new threshold and schedule a debounced re-evaluation.
    pub fn set_threshold(&self, value: f64) -> Result<f64, DashboardError> {
        self.controller.set_threshold(value)
    }

    /// Latest metrics from the scoring service.
    pub fn metrics(&self) -> Option<ModelMetrics> {
        self.controller.value()
    }

    pub fn snapshot(&self) -> ThresholdSnapshot<ModelMetrics> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThresholdSnapshot<ModelMetrics>> {
        self.controller.subscribe()
    }

    /// Evaluations sent since the current model was loaded.
    pub fn evaluations_dispatched(&self) -> u64 {
        self.controller.dispatched()
    }

    /// Wait for the pending evaluation, if any.
    pub async fn settled(&self) -> ThresholdSnapshot<ModelMetrics> {
        self.controller.settled().await
    }

    /// Metrics computed locally at the current threshold.
    pub fn local_metrics(&self) -> ModelMetrics {
        metrics::evaluate(self.transactions.as_slice(), self.threshold())
    }

    /// Transactions flagged at the current threshold, in load order.
    pub fn flagged(&self) -> Vec<&Transaction> {
        metrics::flagged(self.transactions.as_slice(), self.threshold())
    }

    pub fn transactions(&self) -> &TransactionSet {
        &self.transactions
    }

    pub fn total_fraud(&self) -> usize {
        self.transactions.total_fraud()
    }

    pub fn fraud_rate(&self) -> f64 {
        self.transactions.fraud_rate()
    }

    pub fn aggregates(&self) -> &AggregateViews {
        &self.aggregates
    }

    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    /// Sorted by importance, highest first.
    pub fn feature_importance(&self) -> &[FeatureImportance] {
        &self.feature_importance
    }

    pub fn max_importance(&self) -> f64 {
        max_importance(&self.feature_importance)
    }

    /// Select a row for explanation, or clear the selection.
    pub fn select_transaction(&self, id: Option<&str>) -> Result<(), DashboardError> {
        if let Some(id) = id
            && !self.transactions.contains(id)
        {
            return Err(DashboardError::UnknownTransaction { id: id.to_string() });
        }
        self.explanations.select(id);
        Ok(())
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.explanations
            .selected()
            .and_then(|id| self.transactions.find(&id))
    }

    pub fn explanation(&self) -> ExplanationView {
        self.explanations.view()
    }

    pub fn subscribe_explanation(&self) -> watch::Receiver<ExplanationView> {
        self.explanations.subscribe()
    }

    pub async fn explanation_settled(&self) -> ExplanationView {
        self.explanations.settled().await
    }

    /// Reload everything for `model`, keeping the current threshold.
    ///
    /// On failure the previous model's state stays in place.
    pub async fn switch_model(&mut self, model: ModelKind) -> Result<(), DashboardError> {
        if model == self.model {
            return Ok(());
        }
        let from = self.model;
        let threshold = self.threshold();
        info!(%from, to = %model, threshold, "Switching model");

        let loaded = load_model(&self.service, model, threshold, self.settings.top_risk_limit)
            .await
            .map_err(|source| {
                warn!(
                    %from,
                    to = %model,
                    error = %source,
                    "Model switch failed, keeping current model"
                );
                DashboardError::ModelSwitch {
                    from,
                    to: model,
                    source,
                }
            })?;

        // Replacing the controller drops the old one, which cancels its pending dispatch
        self.controller = ThresholdController::new(
            ModelEvaluator::new(Arc::clone(&self.service), model),
            threshold,
            Some(loaded.initial_metrics),
            self.settings.controller_options(),
        );
        self.model = model;
        self.transactions = loaded.transactions;
        self.aggregates = loaded.aggregates;
        self.curves = loaded.curves;
        self.feature_importance = loaded.feature_importance;

        if let Some(id) = self.explanations.selected()
            && !self.transactions.contains(&id)
        {
            self.explanations.select(None);
        }
        self.explanations.set_model(model);
        Ok(())
    }
}
