use crate::domain::explanation::Explanation;
use crate::domain::ports::ScoringService;
use crate::domain::transaction::ModelKind;
use crate::infrastructure::observability::DashboardMetrics;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Tolerance for the additivity check on incoming explanations.
const ADDITIVITY_TOLERANCE: f64 = 1e-3;

/// What the explanation panel shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplanationView {
    /// Nothing selected
    Idle,
    Loading {
        transaction_id: String,
        model: ModelKind,
    },
    Ready {
        transaction_id: String,
        model: ModelKind,
        explanation: Explanation,
    },
    /// The fetch failed; scoped to this transaction only
    Unavailable {
        transaction_id: String,
        model: ModelKind,
        reason: String,
    },
}

impl ExplanationView {
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { transaction_id, .. }
            | Self::Ready { transaction_id, .. }
            | Self::Unavailable { transaction_id, .. } => Some(transaction_id),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        match self {
            Self::Ready { explanation, .. } => Some(explanation),
            _ => None,
        }
    }
}

struct SelectionState {
    selected: Option<String>,
    model: ModelKind,
    generation: u64,
}

struct Shared {
    service: Arc<dyn ScoringService>,
    metrics: Option<DashboardMetrics>,
    state: Mutex<SelectionState>,
    view: watch::Sender<ExplanationView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the "selected transaction" and its on-demand explanation.
///
/// Only the result for the current selection under the current model is
/// ever shown; anything that resolves after being superseded is dropped.
pub struct ExplanationSelector {
    shared: Arc<Shared>,
}

impl ExplanationSelector {
    pub fn new(
        service: Arc<dyn ScoringService>,
        model: ModelKind,
        metrics: Option<DashboardMetrics>,
    ) -> Self {
        let (view, _) = watch::channel(ExplanationView::Idle);
        Self {
            shared: Arc::new(Shared {
                service,
                metrics,
                state: Mutex::new(SelectionState {
                    selected: None,
                    model,
                    generation: 0,
                }),
                view,
            }),
        }
    }

    /// Select a transaction, or clear the selection with `None`.
    ///
    /// Re-selecting the row that is already loading or shown is a no-op;
    /// re-selecting an unavailable one retries.
    pub fn select(&self, transaction_id: Option<&str>) {
        let mut state = self.shared.lock();

        match transaction_id {
            None => {
                state.generation += 1;
                state.selected = None;
                self.shared.view.send_replace(ExplanationView::Idle);
            }
            Some(id) => {
                let unchanged = state.selected.as_deref() == Some(id);
                let retry = matches!(
                    *self.shared.view.borrow(),
                    ExplanationView::Unavailable { .. }
                );
                if unchanged && !retry {
                    return;
                }
                state.selected = Some(id.to_string());
                self.start_fetch(&mut state);
            }
        }
    }

    /// Switch the active model; the current selection is re-fetched.
    pub fn set_model(&self, model: ModelKind) {
        let mut state = self.shared.lock();
        if state.model == model {
            return;
        }
        state.model = model;
        if state.selected.is_some() {
            self.start_fetch(&mut state);
        } else {
            // Invalidate anything still in flight for the old model
            state.generation += 1;
        }
    }

    fn start_fetch(&self, state: &mut SelectionState) {
        let Some(transaction_id) = state.selected.clone() else {
            return;
        };
        state.generation += 1;
        let generation = state.generation;
        let model = state.model;

        self.shared.view.send_replace(ExplanationView::Loading {
            transaction_id: transaction_id.clone(),
            model,
        });
        debug!(%transaction_id, %model, generation, "Fetching explanation");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = shared.service.fetch_explanation(&transaction_id, model).await;

            let state = shared.lock();
            if state.generation != generation {
                debug!(
                    %transaction_id,
                    generation,
                    current = state.generation,
                    "Discarding superseded explanation"
                );
                if let Some(metrics) = &shared.metrics {
                    metrics.inc_stale("explanation");
                }
                return;
            }

            let view = match result {
                Ok(explanation) => {
                    if !explanation.is_consistent(ADDITIVITY_TOLERANCE) {
                        warn!(
                            %transaction_id,
                            residual = explanation.residual(),
                            "Explanation contributions do not sum to output value"
                        );
                    }
                    info!(%transaction_id, %model, "Explanation ready");
                    if let Some(metrics) = &shared.metrics {
                        metrics.inc_explanation("ready");
                    }
                    ExplanationView::Ready {
                        transaction_id,
                        model,
                        explanation,
                    }
                }
                Err(e) => {
                    warn!(%transaction_id, %model, error = %e, "Explanation unavailable");
                    if let Some(metrics) = &shared.metrics {
                        metrics.inc_explanation("unavailable");
                    }
                    ExplanationView::Unavailable {
                        transaction_id,
                        model,
                        reason: e.to_string(),
                    }
                }
            };
            shared.view.send_replace(view);
        });
    }

    pub fn selected(&self) -> Option<String> {
        self.shared.lock().selected.clone()
    }

    pub fn model(&self) -> ModelKind {
        self.shared.lock().model
    }

    pub fn view(&self) -> ExplanationView {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExplanationView> {
        self.shared.view.subscribe()
    }

    /// Wait until the panel is no longer loading.
    pub async fn settled(&self) -> ExplanationView {
        let mut rx = self.shared.view.subscribe();
        loop {
            let view = rx.borrow_and_update().clone();
            if !view.is_loading() {
                return view;
            }
            if rx.changed().await.is_err() {
                return self.view();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::explanation::FeatureContribution;
    use crate::infrastructure::mock::{MockCall, MockEndpoint, MockScoringService};
    use std::time::Duration;

    fn explanation(output_value: f64) -> Explanation {
        Explanation {
            base_value: 0.05,
            output_value,
            features: vec![FeatureContribution {
                feature: "Transaction Amount".to_string(),
                raw_value: 4200.0,
                shap_value: output_value - 0.05,
            }],
        }
    }

    fn mock() -> Arc<MockScoringService> {
        Arc::new(
            MockScoringService::new()
                .with_explanation("A", ModelKind::Xgboost, explanation(0.9))
                .with_explanation("B", ModelKind::Xgboost, explanation(0.2))
                .with_explanation("B", ModelKind::Tensorflow, explanation(0.3))
                .with_latency(|call| match call {
                    MockCall::Explanation { transaction_id, .. } if transaction_id == "A" => {
                        Duration::from_millis(400)
                    }
                    _ => Duration::from_millis(50),
                }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_selection_wins_over_slow_earlier_fetch() {
        let metrics = DashboardMetrics::new().unwrap();
        let selector = ExplanationSelector::new(mock(), ModelKind::Xgboost, Some(metrics.clone()));

        selector.select(Some("A"));
        assert!(selector.view().is_loading());
        selector.select(Some("B"));

        let view = selector.settled().await;
        assert_eq!(view.transaction_id(), Some("B"));
        assert_eq!(view.explanation().map(|e| e.output_value), Some(0.2));

        // A resolves afterwards and must not replace B
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(selector.view(), view);
        assert_eq!(metrics.stale_count("explanation"), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_degrades_to_unavailable() {
        let service = mock();
        service.fail(MockEndpoint::Explanation);
        let selector = ExplanationSelector::new(service.clone(), ModelKind::Xgboost, None);

        selector.select(Some("B"));
        let view = selector.settled().await;
        assert!(matches!(
            view,
            ExplanationView::Unavailable { ref transaction_id, .. } if transaction_id == "B"
        ));

        // Re-selecting an unavailable row retries
        service.recover(MockEndpoint::Explanation);
        selector.select(Some("B"));
        assert!(selector.view().is_loading());
        let view = selector.settled().await;
        assert!(view.explanation().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_transaction_is_unavailable() {
        let selector = ExplanationSelector::new(mock(), ModelKind::Xgboost, None);
        selector.select(Some("ZZZ"));
        assert!(matches!(selector.settled().await, ExplanationView::Unavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_switch_refetches_selection() {
        let service = mock();
        let selector = ExplanationSelector::new(service.clone(), ModelKind::Xgboost, None);

        selector.select(Some("B"));
        selector.set_model(ModelKind::Tensorflow);
        let view = selector.settled().await;

        assert!(matches!(view, ExplanationView::Ready { model: ModelKind::Tensorflow, .. }));
        assert_eq!(view.explanation().map(|e| e.output_value), Some(0.3));
        assert_eq!(service.explanation_requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deselect_discards_in_flight_fetch() {
        let selector = ExplanationSelector::new(mock(), ModelKind::Xgboost, None);

        selector.select(Some("A"));
        selector.select(None);
        assert_eq!(selector.view(), ExplanationView::Idle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(selector.view(), ExplanationView::Idle);
        assert!(selector.selected().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselecting_same_row_is_noop() {
        let service = mock();
        let selector = ExplanationSelector::new(service.clone(), ModelKind::Xgboost, None);

        selector.select(Some("B"));
        selector.settled().await;
        selector.select(Some("B"));
        assert!(!selector.view().is_loading());
        assert_eq!(service.explanation_requests().len(), 1);
    }
}
