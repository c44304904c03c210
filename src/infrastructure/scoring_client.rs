use crate::domain::curves::RocPoint;
use crate::domain::errors::ScoringError;
use crate::domain::explanation::{Explanation, FeatureImportance};
use crate::domain::metrics::ModelMetrics;
use crate::domain::ports::ScoringService;
use crate::domain::transaction::{ModelKind, TransactionsResponse};
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query, encode_component,
};
use crate::infrastructure::observability::DashboardMetrics;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest error body kept in a `ScoringError::Status`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct EvaluateRequest {
    threshold: f64,
    model: ModelKind,
}

/// `ScoringService` over the scoring API's REST endpoints.
pub struct HttpScoringService {
    client: ClientWithMiddleware,
    base_url: String,
    metrics: Option<DashboardMetrics>,
}

impl HttpScoringService {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
        metrics: Option<DashboardMetrics>,
    ) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout, max_retries),
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, model: ModelKind) -> String {
        build_url_with_query(&format!("{}{}", self.base_url, path), &[("model", model.as_str())])
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ScoringError> {
        let started = Instant::now();
        let result = request.send().await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_latency(endpoint, started.elapsed().as_secs_f64());
        }

        let response = result.map_err(|e| {
            warn!(endpoint, error = %e, "Scoring request failed");
            ScoringError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ScoringError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        debug!(endpoint, status = status.as_u16(), bytes = body.len(), "Scoring response");

        decode_response(endpoint, status, &body)
    }
}

/// Map a raw response onto the scoring error taxonomy.
fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<T, ScoringError> {
    if !status.is_success() {
        let mut text = String::from_utf8_lossy(body).into_owned();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        return Err(ScoringError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_slice(body).map_err(|e| ScoringError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ScoringService for HttpScoringService {
    async fn fetch_transactions(
        &self,
        model: ModelKind,
    ) -> Result<TransactionsResponse, ScoringError> {
        let url = self.url("/transactions", model);
        self.send("transactions", self.client.get(&url)).await
    }

    async fn evaluate(
        &self,
        model: ModelKind,
        threshold: f64,
    ) -> Result<ModelMetrics, ScoringError> {
        let url = format!("{}/model/evaluate", self.base_url);
        let body = serde_json::to_vec(&EvaluateRequest { threshold, model }).map_err(|e| {
            ScoringError::Decode {
                endpoint: "evaluate".to_string(),
                reason: e.to_string(),
            }
        })?;
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send("evaluate", request).await
    }

    async fn fetch_curve(&self, model: ModelKind) -> Result<Vec<RocPoint>, ScoringError> {
        let url = self.url("/model/roc", model);
        self.send("roc", self.client.get(&url)).await
    }

    async fn fetch_feature_importance(
        &self,
        model: ModelKind,
    ) -> Result<Vec<FeatureImportance>, ScoringError> {
        let url = self.url("/model/features", model);
        self.send("features", self.client.get(&url)).await
    }

    async fn fetch_explanation(
        &self,
        transaction_id: &str,
        model: ModelKind,
    ) -> Result<Explanation, ScoringError> {
        let path = format!("/model/shap/{}", encode_component(transaction_id));
        let url = self.url(&path, model);
        self.send("shap", self.client.get(&url)).await
    }
}
