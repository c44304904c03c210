//! Side-by-side comparison of the two models under one threshold.
//!
//! Both models are evaluated by a single paired request per dispatch, so the
//! two sides of the table always come from the same threshold.

use crate::application::dashboard::DashboardSettings;
use crate::application::threshold_controller::{
    ThresholdController, ThresholdEvaluator, ThresholdSnapshot, clamp_threshold,
};
use crate::domain::curves::CurveSet;
use crate::domain::errors::{DashboardError, ScoringError};
use crate::domain::explanation::{FeatureImportance, max_importance, rank_importances};
use crate::domain::metrics::{MetricDelta, ModelMetrics};
use crate::domain::ports::ScoringService;
use crate::domain::transaction::ModelKind;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Metrics for both models at one threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedMetrics {
    pub threshold: f64,
    pub primary: ModelMetrics,
    pub challenger: ModelMetrics,
}

impl PairedMetrics {
    /// Challenger minus primary, in percentage points.
    pub fn deltas(&self) -> MetricDelta {
        self.primary.delta_to(&self.challenger)
    }
}

/// Evaluates both models at the same threshold in one generation.
pub struct PairedEvaluator {
    service: Arc<dyn ScoringService>,
    primary: ModelKind,
    challenger: ModelKind,
}

impl PairedEvaluator {
    pub fn new(
        service: Arc<dyn ScoringService>,
        primary: ModelKind,
        challenger: ModelKind,
    ) -> Self {
        Self {
            service,
            primary,
            challenger,
        }
    }
}

#[async_trait]
impl ThresholdEvaluator for PairedEvaluator {
    type Output = PairedMetrics;

    async fn evaluate(&self, threshold: f64) -> Result<PairedMetrics, ScoringError> {
        let (primary, challenger) = tokio::try_join!(
            self.service.evaluate(self.primary, threshold),
            self.service.evaluate(self.challenger, threshold),
        )?;
        Ok(PairedMetrics {
            threshold,
            primary,
            challenger,
        })
    }

    fn source(&self) -> &'static str {
        "comparison"
    }
}

/// Threshold-independent data for one side of the comparison.
#[derive(Debug, Clone)]
pub struct ModelPipeline {
    pub model: ModelKind,
    pub curves: CurveSet,
    /// Sorted by importance, highest first
    pub feature_importance: Vec<FeatureImportance>,
}

impl ModelPipeline {
    pub fn max_importance(&self) -> f64 {
        max_importance(&self.feature_importance)
    }
}

pub struct ComparisonSession {
    primary: ModelPipeline,
    challenger: ModelPipeline,
    controller: ThresholdController<PairedEvaluator>,
}

impl ComparisonSession {
    /// Compare the default model against its counterpart.
    pub async fn load(
        service: Arc<dyn ScoringService>,
        settings: DashboardSettings,
    ) -> Result<Self, DashboardError> {
        let primary = ModelKind::default();
        Self::load_pair(service, primary, primary.counterpart(), settings).await
    }

    /// Fetch curves, importances and first metrics for both models in
    /// parallel. Ready only when all six succeed.
    pub async fn load_pair(
        service: Arc<dyn ScoringService>,
        primary: ModelKind,
        challenger: ModelKind,
        settings: DashboardSettings,
    ) -> Result<Self, DashboardError> {
        let threshold = clamp_threshold(settings.initial_threshold)?;
        info!(%primary, %challenger, threshold, "Loading comparison");

        let fetched = tokio::try_join!(
            service.fetch_curve(primary),
            service.fetch_curve(challenger),
            service.fetch_feature_importance(primary),
            service.fetch_feature_importance(challenger),
            service.evaluate(primary, threshold),
            service.evaluate(challenger, threshold),
        );
        let (primary_curve, challenger_curve, primary_fi, challenger_fi, primary_m, challenger_m) =
            fetched.map_err(|source| {
                warn!(error = %source, "Comparison load failed");
                DashboardError::ComparisonLoad { source }
            })?;

        let controller = ThresholdController::new(
            PairedEvaluator::new(Arc::clone(&service), primary, challenger),
            threshold,
            Some(PairedMetrics {
                threshold,
                primary: primary_m,
                challenger: challenger_m,
            }),
            settings.controller_options(),
        );

        Ok(Self {
            primary: ModelPipeline {
                model: primary,
                curves: CurveSet::from_points(primary_curve),
                feature_importance: rank_importances(primary_fi),
            },
            challenger: ModelPipeline {
                model: challenger,
                curves: CurveSet::from_points(challenger_curve),
                feature_importance: rank_importances(challenger_fi),
            },
            controller,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.controller.threshold()
    }

    pub fn set_threshold(&self, value: f64) -> Result<f64, DashboardError> {
        self.controller.set_threshold(value)
    }

    pub fn metrics(&self) -> Option<PairedMetrics> {
        self.controller.value()
    }

    pub fn deltas(&self) -> Option<MetricDelta> {
        self.metrics().map(|m| m.deltas())
    }

    pub fn primary(&self) -> &ModelPipeline {
        &self.primary
    }

    pub fn challenger(&self) -> &ModelPipeline {
        &self.challenger
    }

    pub fn pipeline(&self, model: ModelKind) -> Option<&ModelPipeline> {
        [&self.primary, &self.challenger]
            .into_iter()
            .find(|p| p.model == model)
    }

    pub fn snapshot(&self) -> ThresholdSnapshot<PairedMetrics> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThresholdSnapshot<PairedMetrics>> {
        self.controller.subscribe()
    }

    pub async fn settled(&self) -> ThresholdSnapshot<PairedMetrics> {
        self.controller.settled().await
    }
}
