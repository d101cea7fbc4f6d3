//! Shared test helpers for `threatlink-core` integration tests.
//!
//! `FakeTransport` stands in for the network: it records every request with
//! its arrival time and answers through a handler closure, so tests can
//! count transport calls and measure backoff gaps under paused time.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use threatlink_core::{Transport, TransportFailure, TransportRequest};
use threatlink_domain::{ApiResponse, Headers};
use tokio::time::Instant;

/// What the fake does with one request
pub enum Step {
    Respond(ApiResponse),
    Fail(TransportFailure),
    /// Never answer (exercises timeouts and cancellation)
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub request: TransportRequest,
}

impl RecordedCall {
    pub fn body_json(&self) -> serde_json::Value {
        self.request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}

type Handler = Box<dyn Fn(&TransportRequest) -> Step + Send + Sync>;

pub struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new(handler: impl Fn(&TransportRequest) -> Step + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) })
    }

    /// Play `steps` in order, then answer `200 {}` forever
    pub fn scripted(steps: Vec<Step>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(steps));
        Self::new(move |_| queue.lock().pop_front().unwrap_or_else(|| Step::Respond(ok())))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls whose URL path equals `path`
    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls.lock().iter().filter(|call| call.request.url.path() == path).cloned().collect()
    }

    /// Time between consecutive calls
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock();
        calls.windows(2).map(|pair| pair[1].at - pair[0].at).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure> {
        self.calls.lock().push(RecordedCall { at: Instant::now(), request: request.clone() });
        match (self.handler)(&request) {
            Step::Respond(response) => Ok(response),
            Step::Fail(failure) => Err(failure),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub fn ok() -> ApiResponse {
    json(200, serde_json::json!({}))
}

pub fn status(status: u16) -> ApiResponse {
    ApiResponse::new(status, Headers::new(), Vec::new())
}

pub fn json(status: u16, body: serde_json::Value) -> ApiResponse {
    ApiResponse::new(status, Headers::new(), body.to_string().into_bytes())
}

pub fn with_headers(mut response: ApiResponse, headers: &[(&str, &str)]) -> ApiResponse {
    for (name, value) in headers {
        response.headers.insert(name, *value);
    }
    response
}
