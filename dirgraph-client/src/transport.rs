//! Transport layer abstraction.
//!
//! The paging, typing and batching logic only ever talks to the service
//! through [`GraphTransport::perform`], so it can run against the reqwest
//! implementation in [`crate::http`] or the in-memory [`mock`] transport.

use crate::error::{GraphError, GraphResult};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// Path relative to the versioned API root (`users/{id}/memberOf`).
    Path(String),
    /// Absolute URL, used as-is (continuation cursors).
    Url(String),
}

/// A single logical request to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    pub method: Method,
    pub target: RequestTarget,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Return non-2xx responses instead of turning them into errors.
    pub allow_error_status: bool,
}

impl GraphRequest {
    pub fn new(method: Method, target: RequestTarget) -> Self {
        Self {
            method,
            target,
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            allow_error_status: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, RequestTarget::Path(path.into()))
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, RequestTarget::Path(path.into())).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, RequestTarget::Path(path.into())).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, RequestTarget::Path(path.into()))
    }

    /// A GET against an absolute URL such as an `@odata.nextLink`.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(Method::GET, RequestTarget::Url(url.into()))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn allow_error_status(mut self) -> Self {
        self.allow_error_status = true;
        self
    }
}

/// A response from the service with its body decoded as JSON.
///
/// Empty bodies decode to `Value::Null`; non-JSON bodies to a string.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl GraphResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> GraphResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Converts a non-2xx response into [`GraphError::Transport`].
    ///
    /// The OData `error.code`/`error.message` pair is used when present.
    pub fn error_for_status(self) -> GraphResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let (code, message) = odata_error(&self.body);
        Err(GraphError::Transport {
            status: self.status,
            code,
            message: message.unwrap_or_else(|| fallback_message(self.status, &self.body)),
        })
    }
}

/// Extracts `error.code` and `error.message` from an OData error body.
pub(crate) fn odata_error(body: &Value) -> (Option<String>, Option<String>) {
    let error = body.get("error");
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);
    (code, message)
}

pub(crate) fn fallback_message(status: u16, body: &Value) -> String {
    match body {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Null => format!("HTTP {status}"),
        other => other.to_string(),
    }
}

/// The collaborator every core component issues requests through.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// Tenant the transport's token belongs to.
    fn tenant(&self) -> &str;

    /// Sends a request and waits for the final response.
    ///
    /// Throttling retries happen inside this call; callers only see the
    /// final success or failure.
    async fn perform(&self, request: GraphRequest) -> GraphResult<GraphResponse>;
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    /// Replays queued responses and records every request it receives.
    #[derive(Debug)]
    pub struct MockTransport {
        tenant: String,
        responses: Mutex<VecDeque<GraphResult<GraphResponse>>>,
        requests: Mutex<Vec<GraphRequest>>,
    }

    impl MockTransport {
        pub fn new(tenant: impl Into<String>) -> Self {
            Self {
                tenant: tenant.into(),
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queues a 200 response with a JSON body.
        pub fn push_json(&self, body: Value) {
            self.push_response(GraphResponse::new(200, body));
        }

        /// Queues an arbitrary response.
        pub fn push_response(&self, response: GraphResponse) {
            self.lock_responses().push_back(Ok(response));
        }

        /// Queues a transport-level failure.
        pub fn push_error(&self, error: GraphError) {
            self.lock_responses().push_back(Err(error));
        }

        /// Requests received so far, oldest first.
        pub fn requests(&self) -> Vec<GraphRequest> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Number of queued responses not yet consumed.
        pub fn pending(&self) -> usize {
            self.lock_responses().len()
        }

        fn lock_responses(
            &self,
        ) -> std::sync::MutexGuard<'_, VecDeque<GraphResult<GraphResponse>>> {
            self.responses.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[async_trait]
    impl GraphTransport for MockTransport {
        fn tenant(&self) -> &str {
            &self.tenant
        }

        async fn perform(&self, request: GraphRequest) -> GraphResult<GraphResponse> {
            let allow_error_status = request.allow_error_status;
            let description = format!("{} {:?}", request.method, request.target);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            let next = self.lock_responses().pop_front();
            match next {
                Some(Ok(response)) if allow_error_status => Ok(response),
                Some(Ok(response)) => response.error_for_status(),
                Some(Err(e)) => Err(e),
                None => Err(GraphError::Transport {
                    status: 501,
                    code: None,
                    message: format!("no mock response queued for {description}"),
                }),
            }
        }
    }
}
