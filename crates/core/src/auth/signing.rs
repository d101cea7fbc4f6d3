//! Default API-key signer

use threatlink_domain::{DEFAULT_API_KEY_HEADER, DEFAULT_API_SECRET_HEADER};

use super::ports::{RequestSigner, SigningContext};

/// Sends the key pair as two plain headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderKeySigner {
    key_header: String,
    secret_header: String,
}

impl HeaderKeySigner {
    pub fn new(key_header: impl Into<String>, secret_header: impl Into<String>) -> Self {
        Self { key_header: key_header.into(), secret_header: secret_header.into() }
    }
}

impl Default for HeaderKeySigner {
    fn default() -> Self {
        Self::new(DEFAULT_API_KEY_HEADER, DEFAULT_API_SECRET_HEADER)
    }
}

impl RequestSigner for HeaderKeySigner {
    fn sign(&self, _context: &SigningContext<'_>, key: &str, secret: &str) -> Vec<(String, String)> {
        vec![
            (self.key_header.clone(), key.to_string()),
            (self.secret_header.clone(), secret.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use threatlink_domain::HttpMethod;
    use url::Url;

    use super::*;

    #[test]
    fn test_default_headers() {
        let url = Url::parse("https://api.example.com/v1/x").unwrap();
        let context = SigningContext { method: HttpMethod::Get, url: &url, body: None };
        let headers = HeaderKeySigner::default().sign(&context, "key", "secret");
        assert_eq!(
            headers,
            vec![
                ("X-API-Key".to_string(), "key".to_string()),
                ("X-API-Secret".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_custom_header_names() {
        let url = Url::parse("https://api.example.com/").unwrap();
        let context = SigningContext { method: HttpMethod::Post, url: &url, body: Some(b"{}") };
        let headers = HeaderKeySigner::new("Api-Key", "Api-Secret").sign(&context, "k", "s");
        assert_eq!(headers[0].0, "Api-Key");
        assert_eq!(headers[1], ("Api-Secret".to_string(), "s".to_string()));
    }
}
