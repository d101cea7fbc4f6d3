//! Logical request description handed to the dispatcher

use std::fmt;

use serde::Serialize;

use crate::errors::ApiError;

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Idempotency implied by HTTP semantics, used unless a request overrides it
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one API call
///
/// Build with [`RequestSpec::get`], [`RequestSpec::post`] and friends:
///
/// ```rust
/// use threatlink_domain::RequestSpec;
///
/// let spec = RequestSpec::get("/v1/indicators/search")
///     .query("q", "example.com")
///     .query("limit", "50")
///     .build();
///
/// assert!(spec.requires_auth());
/// assert!(spec.is_idempotent());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    requires_auth: bool,
    idempotent: bool,
}

impl RequestSpec {
    pub fn builder(method: HttpMethod, path: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            requires_auth: true,
            idempotent: None,
        }
    }

    pub fn get(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> RequestSpecBuilder {
        Self::builder(HttpMethod::Delete, path)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// Whether the request may be replayed after bytes reached the server
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }
}

/// Builder for [`RequestSpec`]
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    requires_auth: bool,
    idempotent: Option<bool>,
}

impl RequestSpecBuilder {
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a query parameter only when `value` is present
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` if the value cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| {
            ApiError::bad_request(format!("Failed to serialize request body: {e}"))
        })?;
        Ok(self.body(value))
    }

    /// Send without credentials (login flow, health checks)
    pub fn unauthenticated(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Override the idempotency implied by the HTTP method
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    pub fn build(self) -> RequestSpec {
        let idempotent = self.idempotent.unwrap_or_else(|| self.method.is_idempotent());
        RequestSpec {
            method: self.method,
            path: self.path,
            query: self.query,
            body: self.body,
            requires_auth: self.requires_auth,
            idempotent,
        }
    }
}
