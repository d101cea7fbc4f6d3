//! Indicator search and lookup

use std::sync::Arc;

use serde::Serialize;
use threatlink_core::RequestDispatcher;
use threatlink_domain::{ApiResult, RequestSpec};
use tracing::{debug, instrument};
use urlencoding::encode;

use super::models::{Indicator, IndicatorType, Page};

/// Search request body
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorQuery {
    pub query: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub indicator_type: Option<IndicatorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl IndicatorQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn of_type(mut self, indicator_type: IndicatorType) -> Self {
        self.indicator_type = Some(indicator_type);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

#[derive(Clone)]
pub struct SearchClient {
    dispatcher: Arc<RequestDispatcher>,
}

impl SearchClient {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run an indicator query.
    ///
    /// Searches are POSTed but have no side effects, so they stay
    /// retry-eligible.
    #[instrument(skip(self, query), fields(query = %query.query))]
    pub async fn query(&self, query: &IndicatorQuery) -> ApiResult<Page<Indicator>> {
        let spec = RequestSpec::post("/v1/search").json(query)?.idempotent(true).build();
        let page: Page<Indicator> = self.dispatcher.execute_json(spec).await?;

        debug!(count = page.items.len(), has_more = page.has_more(), "search completed");
        Ok(page)
    }

    /// Fetch a single indicator; unknown values surface as `NotFound`.
    #[instrument(skip(self))]
    pub async fn lookup(&self, indicator_type: IndicatorType, value: &str) -> ApiResult<Indicator> {
        let path = format!("/v1/indicators/{}/{}", indicator_type, encode(value));
        self.dispatcher.execute_json(RequestSpec::get(path).build()).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use threatlink_domain::ApiError;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::test_support::dispatcher_for;

    #[tokio::test]
    async fn query_posts_filters_and_decodes_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .and(header("x-api-key", "test-key"))
            .and(body_json(json!({"query": "emotet", "type": "domain", "limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"value": "a.test", "type": "domain", "tags": ["emotet"]},
                    {"value": "b.test", "type": "domain"}
                ],
                "next_cursor": "page-2",
                "total": 7
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = SearchClient::new(dispatcher_for(&server));
        let query = IndicatorQuery::new("emotet").of_type(IndicatorType::Domain).limit(2);
        let page = search.query(&query).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].tags, vec!["emotet".to_string()]);
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        assert_eq!(page.total, Some(7));
    }

    #[tokio::test]
    async fn query_is_retried_on_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let search = SearchClient::new(dispatcher_for(&server));
        let page = search.query(&IndicatorQuery::new("x")).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookup_encodes_value_into_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/indicators/url/https%3A%2F%2Fevil.test%2Fx"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": "https://evil.test/x", "type": "url"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let search = SearchClient::new(dispatcher_for(&server));
        let indicator = search.lookup(IndicatorType::Url, "https://evil.test/x").await.unwrap();

        assert_eq!(indicator.value, "https://evil.test/x");
    }

    #[tokio::test]
    async fn lookup_of_unknown_indicator_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "no such indicator"})),
            )
            .mount(&server)
            .await;

        let search = SearchClient::new(dispatcher_for(&server));
        let err = search.lookup(IndicatorType::Ip, "10.0.0.1").await.unwrap_err();

        assert_eq!(err, ApiError::NotFound { message: "no such indicator".into() });
    }
}
