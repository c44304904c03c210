//! Debounced threshold state.
//!
//! The controller owns the decision threshold. Every change is visible
//! immediately through [`ThresholdController::threshold`], while the expensive
//! re-evaluation is coalesced: it runs once after the input has been quiet for
//! the debounce window, for the last value of the burst.
//!
//! Each dispatch carries a generation number. A response is applied only if
//! its generation is higher than every response seen before it, so a slow
//! early request can never overwrite a faster later one. In-flight requests
//! are never aborted; their results are simply dropped when stale.

use crate::domain::errors::{DashboardError, ScoringError};
use crate::infrastructure::observability::DashboardMetrics;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);
pub const DEFAULT_THRESHOLD: f64 = 0.55;

/// Clamp into [0, 1]. NaN has no meaningful position and is rejected.
pub fn clamp_threshold(value: f64) -> Result<f64, DashboardError> {
    if value.is_nan() {
        return Err(DashboardError::InvalidThreshold { value });
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Remote evaluation dispatched by the controller.
#[async_trait]
pub trait ThresholdEvaluator: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn evaluate(&self, threshold: f64) -> Result<Self::Output, ScoringError>;

    /// Label used in logs and stale-response counters.
    fn source(&self) -> &'static str {
        "threshold"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// No dispatch scheduled
    Idle,
    /// A dispatch is scheduled but has not been sent yet
    Pending,
}

/// Everything a consumer needs to render threshold-dependent state.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSnapshot<T> {
    /// Current slider value, always up to date
    pub threshold: f64,
    pub phase: ControllerPhase,
    /// Latest applied evaluation
    pub value: Option<T>,
    /// Threshold `value` was computed for
    pub evaluated_threshold: Option<f64>,
    /// Generation of the latest response seen
    pub generation: u64,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct ControllerOptions {
    pub window: Duration,
    pub metrics: Option<DashboardMetrics>,
}

impl ControllerOptions {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<DashboardMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

struct PendingDispatch {
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct DispatchState {
    pending: Option<PendingDispatch>,
    next_ticket: u64,
    issued: u64,
    latest_seen: u64,
}

struct Shared<E: ThresholdEvaluator> {
    evaluator: E,
    window: Duration,
    metrics: Option<DashboardMetrics>,
    state: Mutex<DispatchState>,
    snapshot: watch::Sender<ThresholdSnapshot<E::Output>>,
}

impl<E: ThresholdEvaluator> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_settled(&self) -> bool {
        let state = self.lock();
        state.pending.is_none() && state.latest_seen >= state.issued
    }

    fn apply(&self, generation: u64, threshold: f64, result: Result<E::Output, ScoringError>) {
        let mut state = self.lock();
        if generation <= state.latest_seen {
            debug!(
                source = self.evaluator.source(),
                generation,
                latest = state.latest_seen,
                threshold,
                "Discarding stale evaluation"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_stale(self.evaluator.source());
            }
            return;
        }
        state.latest_seen = generation;

        match result {
            Ok(value) => self.snapshot.send_modify(|s| {
                s.value = Some(value);
                s.evaluated_threshold = Some(threshold);
                s.generation = generation;
                s.last_error = None;
            }),
            Err(e) => {
                warn!(
                    source = self.evaluator.source(),
                    generation,
                    threshold,
                    error = %e,
                    "Evaluation failed, keeping previous result"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.evaluation_failures_total.inc();
                }
                self.snapshot.send_modify(|s| {
                    s.generation = generation;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }
}

async fn dispatch_after_quiescence<E: ThresholdEvaluator>(
    shared: Arc<Shared<E>>,
    ticket: u64,
    threshold: f64,
) {
    tokio::time::sleep(shared.window).await;

    let generation = {
        let mut state = shared.lock();
        // A newer change may have replaced us between wake-up and lock
        if state.pending.as_ref().map(|p| p.ticket) != Some(ticket) {
            return;
        }
        state.pending = None;
        state.issued += 1;
        shared
            .snapshot
            .send_modify(|s| s.phase = ControllerPhase::Idle);
        state.issued
    };

    info!(
        source = shared.evaluator.source(),
        generation, threshold, "Dispatching evaluation"
    );
    if let Some(metrics) = &shared.metrics {
        metrics.evaluations_dispatched_total.inc();
    }

    let result = shared.evaluator.evaluate(threshold).await;
    shared.apply(generation, threshold, result);
}

/// Owner of the decision threshold.
///
/// Must be driven from inside a tokio runtime: `set_threshold` spawns the
/// debounce timer.
pub struct ThresholdController<E: ThresholdEvaluator> {
    shared: Arc<Shared<E>>,
}

impl<E: ThresholdEvaluator> ThresholdController<E> {
    /// `initial_value`, when present, is treated as already evaluated at
    /// `initial_threshold`.
    pub fn new(
        evaluator: E,
        initial_threshold: f64,
        initial_value: Option<E::Output>,
        options: ControllerOptions,
    ) -> Self {
        let threshold = clamp_threshold(initial_threshold).unwrap_or(DEFAULT_THRESHOLD);
        let evaluated_threshold = initial_value.as_ref().map(|_| threshold);
        let (snapshot, _) = watch::channel(ThresholdSnapshot {
            threshold,
            phase: ControllerPhase::Idle,
            value: initial_value,
            evaluated_threshold,
            generation: 0,
            last_error: None,
        });

        Self {
            shared: Arc::new(Shared {
                evaluator,
                window: options.window,
                metrics: options.metrics,
                state: Mutex::new(DispatchState::default()),
                snapshot,
            }),
        }
    }

    /// Store the value now and (re)schedule the evaluation.
    ///
    /// Returns the stored value after clamping.
    pub fn set_threshold(&self, value: f64) -> Result<f64, DashboardError> {
        let threshold = clamp_threshold(value)?;
        let shared = &self.shared;

        let mut state = shared.lock();
        if let Some(previous) = state.pending.take() {
            previous.handle.abort();
            debug!(ticket = previous.ticket, "Rescheduling pending dispatch");
        }
        state.next_ticket += 1;
        let ticket = state.next_ticket;

        shared.snapshot.send_modify(|s| {
            s.threshold = threshold;
            s.phase = ControllerPhase::Pending;
        });

        let handle = tokio::spawn(dispatch_after_quiescence(
            Arc::clone(shared),
            ticket,
            threshold,
        ));
        state.pending = Some(PendingDispatch { ticket, handle });

        Ok(threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.shared.snapshot.borrow().threshold
    }

    pub fn phase(&self) -> ControllerPhase {
        self.shared.snapshot.borrow().phase
    }

    pub fn value(&self) -> Option<E::Output> {
        self.shared.snapshot.borrow().value.clone()
    }

    pub fn snapshot(&self) -> ThresholdSnapshot<E::Output> {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThresholdSnapshot<E::Output>> {
        self.shared.snapshot.subscribe()
    }

    /// Number of evaluations sent so far.
    pub fn dispatched(&self) -> u64 {
        self.shared.lock().issued
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Wait until nothing is scheduled and the newest dispatch has answered.
    pub async fn settled(&self) -> ThresholdSnapshot<E::Output> {
        let mut rx = self.shared.snapshot.subscribe();
        loop {
            if self.shared.is_settled() {
                return self.snapshot();
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl<E: ThresholdEvaluator> Drop for ThresholdController<E> {
    fn drop(&mut self) {
        if let Some(pending) = self.shared.lock().pending.take() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    type LatencyFn = fn(f64) -> Duration;

    /// Echoes the threshold back after a threshold-dependent delay.
    struct RecordingEvaluator {
        calls: Arc<Mutex<Vec<f64>>>,
        latency: LatencyFn,
        fail_above: Option<f64>,
    }

    impl RecordingEvaluator {
        fn new(latency: LatencyFn) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                latency,
                fail_above: None,
            }
        }

        fn failing_above(mut self, limit: f64) -> Self {
            self.fail_above = Some(limit);
            self
        }

        fn calls(&self) -> Arc<Mutex<Vec<f64>>> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl ThresholdEvaluator for RecordingEvaluator {
        type Output = f64;

        async fn evaluate(&self, threshold: f64) -> Result<f64, ScoringError> {
            self.calls.lock().unwrap().push(threshold);
            sleep((self.latency)(threshold)).await;
            match self.fail_above {
                Some(limit) if threshold > limit => Err(ScoringError::Unavailable {
                    reason: "scorer overloaded".to_string(),
                }),
                _ => Ok(threshold),
            }
        }
    }

    fn fast(_: f64) -> Duration {
        Duration::from_millis(20)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_dispatches_only_final_value() {
        let evaluator = RecordingEvaluator::new(fast);
        let calls = evaluator.calls();
        let controller =
            ThresholdController::new(evaluator, 0.55, None, ControllerOptions::default());

        controller.set_threshold(0.4).unwrap();
        sleep(Duration::from_millis(50)).await;
        controller.set_threshold(0.5).unwrap();
        sleep(Duration::from_millis(50)).await;
        controller.set_threshold(0.6).unwrap();

        assert_eq!(controller.threshold(), 0.6);
        assert_eq!(controller.phase(), ControllerPhase::Pending);

        let snapshot = controller.settled().await;
        assert_eq!(*calls.lock().unwrap(), vec![0.6]);
        assert_eq!(controller.dispatched(), 1);
        assert_eq!(snapshot.value, Some(0.6));
        assert_eq!(snapshot.evaluated_threshold, Some(0.6));
        assert_eq!(snapshot.phase, ControllerPhase::Idle);
        assert_eq!(snapshot.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_waits_for_quiescence() {
        let evaluator = RecordingEvaluator::new(fast);
        let calls = evaluator.calls();
        let controller =
            ThresholdController::new(evaluator, 0.55, None, ControllerOptions::default());

        controller.set_threshold(0.3).unwrap();
        sleep(Duration::from_millis(149)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(controller.phase(), ControllerPhase::Pending);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(*calls.lock().unwrap(), vec![0.3]);
        assert_eq!(controller.phase(), ControllerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_earlier_response_is_discarded() {
        fn latency(threshold: f64) -> Duration {
            if threshold < 0.5 {
                Duration::from_millis(500)
            } else {
                Duration::from_millis(10)
            }
        }
        let metrics = DashboardMetrics::new().unwrap();
        let evaluator = RecordingEvaluator::new(latency);
        let calls = evaluator.calls();
        let controller = ThresholdController::new(
            evaluator,
            0.55,
            None,
            ControllerOptions::default().with_metrics(Some(metrics.clone())),
        );

        controller.set_threshold(0.3).unwrap();
        // First request is in flight until t=650ms
        sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.dispatched(), 1);
        controller.set_threshold(0.7).unwrap();

        let snapshot = controller.settled().await;
        assert_eq!(snapshot.value, Some(0.7));
        assert_eq!(snapshot.generation, 2);

        sleep(Duration::from_millis(600)).await;
        let snapshot = controller.snapshot();
        assert_eq!(*calls.lock().unwrap(), vec![0.3, 0.7]);
        assert_eq!(snapshot.value, Some(0.7));
        assert_eq!(snapshot.evaluated_threshold, Some(0.7));
        assert_eq!(snapshot.generation, 2);
        assert_eq!(metrics.stale_count("threshold"), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_value() {
        let evaluator = RecordingEvaluator::new(fast).failing_above(0.8);
        let controller =
            ThresholdController::new(evaluator, 0.55, Some(0.55), ControllerOptions::default());

        controller.set_threshold(0.9).unwrap();
        let snapshot = controller.settled().await;
        assert_eq!(snapshot.threshold, 0.9);
        assert_eq!(snapshot.value, Some(0.55));
        assert_eq!(snapshot.evaluated_threshold, Some(0.55));
        assert!(snapshot.last_error.as_deref().unwrap().contains("overloaded"));

        controller.set_threshold(0.2).unwrap();
        let snapshot = controller.settled().await;
        assert_eq!(snapshot.value, Some(0.2));
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_dispatch() {
        let evaluator = RecordingEvaluator::new(fast);
        let calls = evaluator.calls();
        let controller =
            ThresholdController::new(evaluator, 0.55, None, ControllerOptions::default());

        controller.set_threshold(0.1).unwrap();
        drop(controller);
        sleep(Duration::from_secs(1)).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_clamped_and_nan_rejected() {
        let controller = ThresholdController::new(
            RecordingEvaluator::new(fast),
            0.55,
            None,
            ControllerOptions::default(),
        );

        assert_eq!(controller.set_threshold(1.7).unwrap(), 1.0);
        assert_eq!(controller.set_threshold(-0.2).unwrap(), 0.0);
        assert!(matches!(
            controller.set_threshold(f64::NAN),
            Err(DashboardError::InvalidThreshold { .. })
        ));
        assert_eq!(controller.threshold(), 0.0);
    }

    #[test]
    fn test_initial_snapshot() {
        let controller = ThresholdController::new(
            RecordingEvaluator::new(fast),
            0.55,
            Some(0.55),
            ControllerOptions::default(),
        );
        let snapshot = controller.snapshot();

        assert_eq!(snapshot.phase, ControllerPhase::Idle);
        assert_eq!(snapshot.evaluated_threshold, Some(0.55));
        assert_eq!(snapshot.generation, 0);
        assert_eq!(controller.window(), DEFAULT_DEBOUNCE);
    }
}
