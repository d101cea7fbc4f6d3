//! Indicator submission, single and batched
//!
//! Ingest writes are not idempotent: the dispatcher only retries them when
//! the request never left the client. Batches fan out with bounded
//! parallelism and report per-item failures instead of failing as a whole.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use threatlink_core::RequestDispatcher;
use threatlink_domain::{ApiError, ApiResult, RequestSpec};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::models::IndicatorType;

type TaskList = Vec<(usize, JoinHandle<ApiResult<IngestReceipt>>)>;

/// Indicator to submit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIndicator {
    pub value: String,
    #[serde(rename = "type")]
    pub indicator_type: IndicatorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl NewIndicator {
    pub fn new(indicator_type: IndicatorType, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            indicator_type,
            severity: None,
            confidence: None,
            tags: Vec::new(),
            source: None,
        }
    }

    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Server acknowledgement of one submitted indicator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestReceipt {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Batch fan-out limits
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Items per chunk; chunks are processed one after another
    pub max_batch_size: usize,
    /// Maximum in-flight submissions
    pub max_parallel: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_batch_size: 50, max_parallel: 5 }
    }
}

/// Result of a batch submission
#[derive(Debug, Clone, Default)]
pub struct BatchSubmissionResult {
    /// Receipts of accepted items, keyed by input index
    pub receipts: Vec<(usize, IngestReceipt)>,
    /// Failed items, keyed by input index
    pub errors: Vec<(usize, ApiError)>,
}

impl BatchSubmissionResult {
    pub fn submitted(&self) -> usize {
        self.receipts.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

#[derive(Clone)]
pub struct IngestClient {
    dispatcher: Arc<RequestDispatcher>,
    config: BatchConfig,
}

impl IngestClient {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self::with_config(dispatcher, BatchConfig::default())
    }

    pub fn with_config(dispatcher: Arc<RequestDispatcher>, config: BatchConfig) -> Self {
        let config = BatchConfig {
            max_batch_size: config.max_batch_size.max(1),
            max_parallel: config.max_parallel.max(1),
        };
        Self { dispatcher, config }
    }

    #[instrument(skip(self, indicator), fields(indicator_type = %indicator.indicator_type))]
    pub async fn submit(&self, indicator: &NewIndicator) -> ApiResult<IngestReceipt> {
        Self::submit_with(&self.dispatcher, indicator).await
    }

    /// Submit many indicators.
    ///
    /// # Errors
    ///
    /// Returns the first item's error only if every submission failed.
    #[instrument(skip(self, indicators), fields(count = indicators.len()))]
    pub async fn submit_batch(
        &self,
        indicators: Vec<NewIndicator>,
    ) -> ApiResult<BatchSubmissionResult> {
        let mut result = BatchSubmissionResult::default();
        if indicators.is_empty() {
            return Ok(result);
        }

        let batch_size = self.config.max_batch_size;
        for (batch_idx, chunk) in indicators.chunks(batch_size).enumerate() {
            let mut tasks: TaskList = Vec::new();

            for (idx, indicator) in chunk.iter().enumerate() {
                let dispatcher = Arc::clone(&self.dispatcher);
                let indicator = indicator.clone();
                let global_idx = batch_idx * batch_size + idx;

                tasks.push((
                    global_idx,
                    tokio::spawn(async move { Self::submit_with(&dispatcher, &indicator).await }),
                ));

                if tasks.len() >= self.config.max_parallel {
                    Self::drain_tasks(&mut tasks, &mut result).await;
                }
            }

            Self::drain_tasks(&mut tasks, &mut result).await;
        }

        if result.receipts.is_empty() {
            result.errors.sort_by_key(|(idx, _)| *idx);
            if let Some((_, first)) = result.errors.into_iter().next() {
                return Err(first);
            }
            return Ok(BatchSubmissionResult::default());
        }

        if result.errors.is_empty() {
            info!(submitted = result.submitted(), "batch submission successful");
        } else {
            warn!(
                submitted = result.submitted(),
                failed = result.failed(),
                "batch submission completed with errors"
            );
        }
        Ok(result)
    }

    async fn submit_with(
        dispatcher: &RequestDispatcher,
        indicator: &NewIndicator,
    ) -> ApiResult<IngestReceipt> {
        let spec = RequestSpec::post("/v1/ingest").json(indicator)?.build();
        let receipt: IngestReceipt = dispatcher.execute_json(spec).await?;
        debug!(id = %receipt.id, "indicator accepted");
        Ok(receipt)
    }

    async fn drain_tasks(tasks: &mut TaskList, result: &mut BatchSubmissionResult) {
        for (idx, task) in std::mem::take(tasks) {
            match task.await {
                Ok(Ok(receipt)) => result.receipts.push((idx, receipt)),
                Ok(Err(err)) => result.errors.push((idx, err)),
                Err(join_err) => result.errors.push((
                    idx,
                    ApiError::Unknown {
                        message: format!("submission task failed: {join_err}"),
                        status: None,
                        raw: String::new(),
                    },
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::test_support::dispatcher_for;

    fn ip(value: &str) -> NewIndicator {
        NewIndicator::new(IndicatorType::Ip, value)
    }

    async fn accept(server: &MockServer, value: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .and(body_partial_json(json!({"value": value})))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({"id": format!("id-{value}"), "message": "rejected"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn submit_sends_indicator_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .and(body_partial_json(json!({"value": "evil.test", "type": "domain", "tags": ["c2"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "ind-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let ingest = IngestClient::new(dispatcher_for(&server));
        let indicator = NewIndicator::new(IndicatorType::Domain, "evil.test").tag("c2");
        let receipt = ingest.submit(&indicator).await.unwrap();

        assert_eq!(receipt.id, "ind-1");
    }

    #[tokio::test]
    async fn submit_is_not_retried_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let ingest = IngestClient::new(dispatcher_for(&server));
        let err = ingest.submit(&ip("1.2.3.4")).await.unwrap_err();

        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn batch_reports_partial_success_by_index() {
        let server = MockServer::start().await;
        accept(&server, "1.1.1.1", 201).await;
        accept(&server, "2.2.2.2", 400).await;
        accept(&server, "3.3.3.3", 201).await;

        let ingest = IngestClient::with_config(
            dispatcher_for(&server),
            BatchConfig { max_batch_size: 2, max_parallel: 2 },
        );
        let result = ingest
            .submit_batch(vec![ip("1.1.1.1"), ip("2.2.2.2"), ip("3.3.3.3")])
            .await
            .unwrap();

        assert_eq!(result.submitted(), 2);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.errors[0].0, 1);
        assert!(matches!(result.errors[0].1, ApiError::BadRequest { status: Some(400), .. }));
        let mut indices: Vec<usize> = result.receipts.iter().map(|(idx, _)| *idx).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn batch_fails_when_every_item_fails() {
        let server = MockServer::start().await;
        accept(&server, "1.1.1.1", 400).await;
        accept(&server, "2.2.2.2", 400).await;

        let err = IngestClient::new(dispatcher_for(&server))
            .submit_batch(vec![ip("1.1.1.1"), ip("2.2.2.2")])
            .await
            .unwrap_err();

        assert_eq!(err.message(), "rejected");
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let server = MockServer::start().await;

        let ingest = IngestClient::new(dispatcher_for(&server));
        let result = ingest.submit_batch(Vec::new()).await.unwrap();

        assert_eq!(result.submitted(), 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
