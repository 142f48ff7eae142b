//! reqwest-backed transport with bearer auth and throttling retries.

use crate::auth::TokenSource;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::transport::{GraphRequest, GraphResponse, GraphTransport, RequestTarget};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// HTTP transport for the directory service.
pub struct HttpTransport {
    config: GraphConfig,
    client: Client,
    token: Arc<dyn TokenSource>,
}

impl HttpTransport {
    /// Creates a transport for `config`, authenticating with `token`.
    pub fn new(config: GraphConfig, token: Arc<dyn TokenSource>) -> GraphResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            token,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Full URL for a request target.
    pub fn resolve_url(&self, target: &RequestTarget) -> String {
        match target {
            RequestTarget::Url(url) => url.clone(),
            RequestTarget::Path(path) => {
                format!("{}/{}", self.config.api_root(), path.trim_start_matches('/'))
            }
        }
    }

    async fn send_once(&self, url: &str, request: &GraphRequest) -> GraphResult<reqwest::Response> {
        self.token.ensure_valid().await?;
        let access_token = self.token.access_token().await?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(&access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }
}

#[async_trait]
impl GraphTransport for HttpTransport {
    fn tenant(&self) -> &str {
        &self.config.tenant
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn perform(&self, request: GraphRequest) -> GraphResult<GraphResponse> {
        let url = self.resolve_url(&request.target);
        let mut attempt = 0u32;

        loop {
            let response = self.send_once(&url, &request).await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.config.max_retries {
                    warn!(url = %url, attempts = attempt + 1, "Giving up on throttled request");
                    return Err(GraphError::RateLimited {
                        attempts: attempt + 1,
                    });
                }

                let delay = backoff_delay(attempt, retry_after(response.headers()));
                warn!(
                    url = %url,
                    retry = attempt + 1,
                    max_retries = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Request throttled, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let headers = header_map(response.headers());
            let bytes = response.bytes().await?;
            let body = decode_body(&bytes);
            debug!(url = %url, status = status.as_u16(), "Request completed");

            let response = GraphResponse {
                status: status.as_u16(),
                headers,
                body,
            };
            return if request.allow_error_status {
                Ok(response)
            } else {
                response.error_for_status()
            };
        }
    }
}

/// Seconds from a `Retry-After` header, when it holds a delay.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Server hint if given, otherwise 1s doubled per attempt, capped.
fn backoff_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let delay = match retry_after_secs {
        Some(secs) => Duration::from_secs(secs),
        None => Duration::from_secs(1u64 << attempt.min(16)),
    };
    delay.min(MAX_BACKOFF)
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_without_hint() {
        assert_eq!(backoff_delay(0, None), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, None), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, None), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(10, None), MAX_BACKOFF);
        assert_eq!(backoff_delay(0, Some(600)), MAX_BACKOFF);
    }

    #[test]
    fn backoff_prefers_server_hint() {
        assert_eq!(backoff_delay(5, Some(3)), Duration::from_secs(3));
        assert_eq!(backoff_delay(5, Some(0)), Duration::ZERO);
    }

    #[test]
    fn decode_body_variants() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(decode_body(b"plain text"), Value::String("plain text".into()));
    }
}
