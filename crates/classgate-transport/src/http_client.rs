//! `reqwest`-backed transport.

use std::time::Duration;

use http::header::{CONTENT_TYPE, HeaderValue};

use crate::{ApiRequest, ApiResponse, HeaderMap, HttpTransport, TransportError};

/// Sends requests with a shared `reqwest::Client`.
///
/// Every request carries `Content-Type: application/json` and is bounded
/// by the client timeout (30 s unless configured otherwise).
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Default timeout for a whole request, body included.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a transport for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Self::from_client(client, base_url)
    }

    /// Wraps an existing client. The client's own settings are kept as-is.
    pub fn from_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::InvalidRequest(format!(
                "base URL must be http(s): {base_url:?}"
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        tracing::debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        tracing::debug!(status = status.as_u16(), "response received");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let transport = ReqwestTransport::new("http://localhost:8080/api/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/api");
        assert_eq!(
            transport.url("/auth/login"),
            "http://localhost:8080/api/auth/login"
        );
        assert_eq!(transport.url("students"), "http://localhost:8080/api/students");
    }

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let result = ReqwestTransport::new("localhost:8080");
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }
}
