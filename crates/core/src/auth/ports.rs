//! Port interfaces for authentication

use threatlink_domain::HttpMethod;
use url::Url;

/// What a signer may look at when producing API-key headers
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub method: HttpMethod,
    pub url: &'a Url,
    pub body: Option<&'a [u8]>,
}

/// Turns an API key pair into request headers
///
/// The default [`HeaderKeySigner`](super::signing::HeaderKeySigner) sends
/// the key and secret verbatim. Deployments that require HMAC signatures or
/// timestamps plug in their own implementation.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, context: &SigningContext<'_>, key: &str, secret: &str) -> Vec<(String, String)>;
}

/// Notified by the dispatcher when a bearer token stops being accepted
///
/// Fired on a 401 for a request that carried `token`, and when the
/// dispatcher finds the active bearer past its expiry. Implementations must
/// not block.
pub trait AuthEventListener: Send + Sync {
    fn on_unauthorized(&self, token: &str);
}
