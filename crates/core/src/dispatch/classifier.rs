//! Mapping of request outcomes onto [`ApiError`]
//!
//! | outcome            | error                                   |
//! |--------------------|-----------------------------------------|
//! | 400                | `BadRequest` with JSON body as details  |
//! | 401                | `Unauthorized`                          |
//! | 404                | `NotFound`                              |
//! | 429                | `RateLimitExceeded` with `retry_after`  |
//! | 5xx                | `ServerError`                           |
//! | transport failure  | `TransportError`                        |
//! | anything else      | `Unknown` with the raw body             |
//!
//! Every function here is pure apart from reading the wall clock for
//! HTTP-date `Retry-After` values, and none of them panic on any input.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use threatlink_domain::{ApiError, ApiResponse, Headers};

use super::ports::TransportFailure;

/// Raw bodies longer than this are cut off in error messages
const MAX_MESSAGE_BODY_CHARS: usize = 256;

/// `x-ratelimit-reset` values below this are deltas, above are epoch seconds
pub(crate) const EPOCH_THRESHOLD_SECS: u64 = 1_000_000_000;

/// Longest wait accepted from any server hint; larger values are clamped
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// What came back from one attempt
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Response(&'a ApiResponse),
    Transport(&'a TransportFailure),
}

/// Classify any outcome
pub fn classify(outcome: Outcome<'_>) -> ApiError {
    match outcome {
        Outcome::Response(response) => classify_response(response),
        Outcome::Transport(failure) => classify_transport(failure),
    }
}

pub fn classify_transport(failure: &TransportFailure) -> ApiError {
    ApiError::TransportError { message: failure.message.clone(), cause: failure.kind }
}

/// Classify an HTTP response using the current time for date headers
pub fn classify_response(response: &ApiResponse) -> ApiError {
    classify_response_at(response, Utc::now())
}

/// Classify an HTTP response as of `now`
pub fn classify_response_at(response: &ApiResponse, now: DateTime<Utc>) -> ApiError {
    let status = response.status;
    let raw = response.text();
    let json = serde_json::from_str::<Value>(&raw).ok();
    let message = extract_message(json.as_ref(), &raw, status);

    match status {
        400 => ApiError::BadRequest { message, details: json, status: Some(status) },
        401 => ApiError::Unauthorized { message, status: Some(status) },
        404 => ApiError::NotFound { message },
        429 => ApiError::RateLimitExceeded {
            message,
            retry_after: retry_after(&response.headers, json.as_ref(), now),
            status: Some(status),
        },
        500..=599 => ApiError::ServerError { message, status_code: status },
        _ => ApiError::Unknown { message, status: Some(status), raw },
    }
}

/// Wait requested by the server, most specific source first:
/// `Retry-After` header, `retry_after` body field, `x-ratelimit-reset` header.
pub fn retry_after(
    headers: &Headers,
    body: Option<&Value>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|value| parse_retry_after_header(value, now))
        .or_else(|| body.and_then(body_retry_after))
        .or_else(|| {
            headers
                .get("x-ratelimit-reset")
                .or_else(|| headers.get("ratelimit-reset"))
                .and_then(|value| parse_reset(value, now))
        })
}

/// `Retry-After` is either delta-seconds or an HTTP-date
pub fn parse_retry_after_header(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_SERVER_WAIT));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(until(date.with_timezone(&Utc), now))
}

/// Rate-limit reset header: seconds until reset, or an epoch timestamp
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let seconds = parse_seconds(value)?;
    if seconds < EPOCH_THRESHOLD_SECS as f64 {
        return Some(clamped_secs(seconds));
    }
    let reset = DateTime::from_timestamp(seconds as i64, 0)?;
    Some(until(reset, now))
}

fn parse_seconds(value: &str) -> Option<f64> {
    let seconds = value.trim().parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn until(instant: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (instant - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SERVER_WAIT)
}

/// Non-negative finite seconds, capped at [`MAX_SERVER_WAIT`]
fn clamped_secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).map_or(MAX_SERVER_WAIT, |d| d.min(MAX_SERVER_WAIT))
}

fn body_retry_after(body: &Value) -> Option<Duration> {
    let value = body.get("retry_after").or_else(|| body.get("retryAfter"))?;
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (seconds.is_finite() && seconds >= 0.0).then(|| clamped_secs(seconds))
}

fn extract_message(json: Option<&Value>, raw: &str, status: u16) -> String {
    if let Some(message) = json.and_then(json_message) {
        return message;
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status} {}", reason_phrase(status));
    }
    if trimmed.chars().count() > MAX_MESSAGE_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_MESSAGE_BODY_CHARS).collect();
        return format!("{cut}…");
    }
    trimmed.to_string()
}

fn json_message(json: &Value) -> Option<String> {
    ["message", "error", "detail", "error_description"].iter().find_map(|key| {
        match json.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(inner) => inner.get("message")?.as_str().map(str::to_string),
            _ => None,
        }
    })
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
