//! Batch request compilation and response correlation.
//!
//! Up to [`MAX_BATCH_SIZE`] independent or dependency-ordered sub-requests
//! are sent as one `POST $batch` call. Each sub-request gets a 1-based
//! ordinal (its position in the input) that correlates it with its
//! sub-response and is used in `dependsOn` references.

use crate::error::{GraphError, GraphResult};
use crate::transport::{fallback_message, odata_error, GraphRequest, GraphTransport};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Maximum number of sub-requests the service accepts in one batch.
pub const MAX_BATCH_SIZE: usize = 20;

/// Path of the batch endpoint, relative to the API root.
pub const BATCH_PATH: &str = "$batch";

/// One logical operation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub method: Method,
    /// Path relative to the API root (`users/{id}`).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl BatchRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
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

    /// The relative URL as it appears in the batch envelope.
    ///
    /// Query values are percent-encoded; keys such as `$select` are kept
    /// as written.
    pub fn relative_url(&self) -> String {
        let mut url = format!("/{}", self.path.trim_start_matches('/'));
        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    fn to_wire(&self, ordinal: usize, depends_on: &[usize]) -> WireRequest {
        let mut headers = self.headers.clone();
        let has_content_type = headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"));
        if self.body.is_some() && !has_content_type {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        WireRequest {
            id: ordinal.to_string(),
            method: self.method.as_str().to_string(),
            url: self.relative_url(),
            headers,
            body: self.body.clone(),
            depends_on: depends_on.iter().map(usize::to_string).collect(),
        }
    }
}

/// Ordering constraints between the sub-requests of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dependencies {
    /// All sub-requests are independent.
    #[default]
    None,
    /// Each sub-request depends on its immediate predecessor.
    Linear,
    /// Ordinal → ordinals it depends on. Unlisted requests are independent.
    Explicit(BTreeMap<usize, Vec<usize>>),
}

impl Dependencies {
    /// Resolves the dependency list of every ordinal in `1..=count`.
    ///
    /// A request may only depend on requests with a strictly smaller ordinal.
    fn resolve(&self, count: usize) -> GraphResult<Vec<Vec<usize>>> {
        match self {
            Dependencies::None => Ok(vec![Vec::new(); count]),
            Dependencies::Linear => Ok((1..=count)
                .map(|ordinal| if ordinal > 1 { vec![ordinal - 1] } else { Vec::new() })
                .collect()),
            Dependencies::Explicit(map) => {
                let mut resolved = vec![Vec::new(); count];
                for (&ordinal, deps) in map {
                    if ordinal == 0 || ordinal > count {
                        return Err(GraphError::InvalidDependency(format!(
                            "request {ordinal} does not exist in a batch of {count}"
                        )));
                    }
                    for &dep in deps {
                        if dep == 0 || dep >= ordinal {
                            return Err(GraphError::InvalidDependency(format!(
                                "request {ordinal} cannot depend on request {dep}; \
                                 dependencies must refer to earlier requests"
                            )));
                        }
                    }
                    let unique: BTreeSet<usize> = deps.iter().copied().collect();
                    resolved[ordinal - 1] = unique.into_iter().collect();
                }
                Ok(resolved)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    id: String,
    method: String,
    url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(rename = "dependsOn", skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WireBatch {
    requests: Vec<WireRequest>,
}

#[derive(Debug, Deserialize)]
struct WireResponses {
    responses: Vec<BatchResponse>,
}

/// One sub-response of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl BatchResponse {
    /// The 1-based ordinal of the sub-request this answers.
    pub fn ordinal(&self) -> Option<usize> {
        self.id.parse().ok()
    }

    pub fn is_success(&self) -> bool {
        self.status < 300
    }

    /// The error message carried by a failed sub-response.
    pub fn error_message(&self) -> String {
        let (_, message) = odata_error(&self.body);
        message.unwrap_or_else(|| fallback_message(self.status, &self.body))
    }
}

/// A failed sub-request, reported inside [`GraphError::BatchPartialFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub ordinal: usize,
    pub status: u16,
    pub message: String,
}

/// Builds the batch envelope, validating size and dependencies.
pub fn compile(requests: &[BatchRequest], dependencies: &Dependencies) -> GraphResult<Value> {
    if requests.len() > MAX_BATCH_SIZE {
        return Err(GraphError::TooManyRequests {
            count: requests.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let depends_on = dependencies.resolve(requests.len())?;
    let envelope = WireBatch {
        requests: requests
            .iter()
            .zip(&depends_on)
            .enumerate()
            .map(|(index, (request, deps))| request.to_wire(index + 1, deps))
            .collect(),
    };
    Ok(serde_json::to_value(envelope)?)
}

/// Sorts sub-responses into request order.
///
/// Every ordinal in `1..=expected` must appear exactly once.
pub fn correlate(body: Value, expected: usize) -> GraphResult<Vec<BatchResponse>> {
    let WireResponses { responses } = serde_json::from_value(body)
        .map_err(|e| GraphError::InvalidPage(format!("malformed batch response: {e}")))?;

    let mut slots: Vec<Option<BatchResponse>> = vec![None; expected];
    for response in responses {
        let ordinal = response
            .ordinal()
            .filter(|&n| n >= 1 && n <= expected)
            .ok_or_else(|| {
                GraphError::InvalidPage(format!(
                    "batch response id '{}' does not match any request",
                    response.id
                ))
            })?;
        let slot = &mut slots[ordinal - 1];
        if slot.is_some() {
            return Err(GraphError::InvalidPage(format!(
                "duplicate batch response id '{}'",
                response.id
            )));
        }
        *slot = Some(response);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                GraphError::InvalidPage(format!("no batch response for request {}", index + 1))
            })
        })
        .collect()
}

/// Collects every sub-response with a status of 300 or above.
pub fn failures(responses: &[BatchResponse]) -> Vec<BatchFailure> {
    responses
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_success())
        .map(|(index, r)| BatchFailure {
            ordinal: index + 1,
            status: r.status,
            message: r.error_message(),
        })
        .collect()
}

/// Compiles `requests` into one batch call and returns the sub-responses in
/// request order.
///
/// Size and dependency problems are reported before anything is sent, even
/// for an empty batch; a valid empty batch returns no responses. If any
/// sub-request fails, the whole call fails with
/// [`GraphError::BatchPartialFailure`] listing every failed ordinal.
pub async fn call_batch(
    transport: &dyn GraphTransport,
    requests: &[BatchRequest],
    dependencies: &Dependencies,
) -> GraphResult<Vec<BatchResponse>> {
    let envelope = compile(requests, dependencies)?;
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    debug!(count = requests.len(), "Sending batch request");
    let response = transport
        .perform(GraphRequest::post(BATCH_PATH, envelope))
        .await?;

    let responses = correlate(response.body, requests.len())?;
    let failed = failures(&responses);
    if !failed.is_empty() {
        warn!(
            failed = failed.len(),
            total = responses.len(),
            "Batch completed with failed sub-requests"
        );
        return Err(GraphError::BatchPartialFailure {
            failures: failed,
            responses,
        });
    }

    info!(count = responses.len(), "Batch completed");
    Ok(responses)
}
