use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method};
use threatlink_core::{Transport, TransportFailure, TransportRequest};
use threatlink_domain::{
    ApiResponse, ClientConfig, ConfigError, Headers, HttpMethod, TransportFailureKind,
    DEFAULT_TIMEOUT,
};
use tracing::debug;

/// [`Transport`] backed by a shared reqwest client.
///
/// Sends exactly one exchange per call. Retries, credentials and error
/// classification live in the dispatcher.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Transport matching a client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::builder().timeout(config.timeout).user_agent(config.user_agent.clone()).build()
    }

    async fn exchange(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(to_method(request.method), request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| map_error(&err))?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();
        let body = response.bytes().await.map_err(|err| map_error(&err))?;

        debug!(%status, bytes = body.len(), url = %request.url, "received HTTP response");
        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure> {
        let cancel = request.cancellation.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportFailure::after_send(
                TransportFailureKind::Cancelled,
                "request cancelled",
            )),
            result = self.exchange(request) => result,
        }
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
            user_agent: None,
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Client-wide ceiling; each request also carries its own timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, ConfigError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(ReqwestTransport { client })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Connect failures happen before any byte is written; everything else may
/// have reached the server.
fn map_error(err: &reqwest::Error) -> TransportFailure {
    let message = err.to_string();
    if err.is_connect() {
        return TransportFailure::before_send(TransportFailureKind::Connect, message);
    }
    if err.is_timeout() {
        return TransportFailure::after_send(TransportFailureKind::Timeout, message);
    }
    if err.is_request() || err.is_body() {
        return TransportFailure::after_send(TransportFailureKind::ConnectionReset, message);
    }
    TransportFailure::after_send(TransportFailureKind::Other, message)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use tokio_util::sync::CancellationToken;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(method: HttpMethod, url: &str) -> TransportRequest {
        TransportRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(5),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn returns_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/feeds"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-RateLimit-Remaining", "9")
                    .set_body_string(r#"{"feeds":[]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .send(request(HttpMethod::Get, &format!("{}/v1/feeds", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-ratelimit-remaining"), Some("9"));
        assert_eq!(response.text(), r#"{"feeds":[]}"#);
    }

    #[tokio::test]
    async fn error_statuses_are_responses_not_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let response = transport.send(request(HttpMethod::Get, &server.uri())).await.unwrap();

        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn forwards_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .and(header("x-api-key", "key"))
            .and(body_json(serde_json::json!({"value": "1.2.3.4"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(HttpMethod::Post, &format!("{}/v1/ingest", server.uri()));
        req.headers.push(("X-API-Key".into(), "key".into()));
        req.headers.push(("Content-Type".into(), "application/json".into()));
        req.body = Some(br#"{"value":"1.2.3.4"}"#.to_vec());

        let response = ReqwestTransport::new().unwrap().send(req).await.unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn refused_connection_is_a_pre_send_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let failure = ReqwestTransport::new()
            .unwrap()
            .send(request(HttpMethod::Post, &format!("http://{addr}/v1/ingest")))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, TransportFailureKind::Connect);
        assert!(!failure.bytes_sent);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut req = request(HttpMethod::Get, &server.uri());
        req.timeout = Duration::from_millis(100);

        let failure = ReqwestTransport::new().unwrap().send(req).await.unwrap_err();
        assert_eq!(failure.kind, TransportFailureKind::Timeout);
        assert!(failure.bytes_sent);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let req = request(HttpMethod::Get, &server.uri());
        req.cancellation.cancel();

        let failure = ReqwestTransport::new().unwrap().send(req).await.unwrap_err();
        assert_eq!(failure.kind, TransportFailureKind::Cancelled);
    }
}
