//! Error types for the client layer.

use crate::batch::{BatchFailure, BatchResponse};
use dirgraph_model::ModelError;
use thiserror::Error;

/// Result type for client operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur talking to the directory service.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Model-level failure (e.g. an invalid type registration).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The service answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Transport {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Network or protocol failure below HTTP status handling.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A response did not have the expected envelope shape.
    #[error("invalid page: {0}")]
    InvalidPage(String),

    /// A pager was drained that never had any data.
    #[error("pager is empty")]
    EmptyResult,

    /// Client-side batch size limit exceeded.
    #[error("too many requests in batch: {count} (maximum {max})")]
    TooManyRequests { count: usize, max: usize },

    /// A batch dependency referenced a request it cannot depend on.
    #[error("invalid batch dependency: {0}")]
    InvalidDependency(String),

    /// One or more sub-requests of a batch failed.
    ///
    /// `responses` holds every sub-response in request order, including the
    /// successful ones.
    #[error("batch job encountered errors: {}", describe_failures(.failures))]
    BatchPartialFailure {
        failures: Vec<BatchFailure>,
        responses: Vec<BatchResponse>,
    },

    /// An object operation needs an ID the payload did not carry.
    #[error("{type_name} object has no 'id' property")]
    MissingId { type_name: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Throttling persisted past the retry budget.
    #[error("rate limited: gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },
}

impl GraphError {
    /// The HTTP status behind this error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Transport { status, .. } => Some(*status),
            GraphError::Http(e) => e.status().map(|s| s.as_u16()),
            GraphError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns true if this error represents a 429 rate-limit response.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

fn describe_failures(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("request {}: {}", f.ordinal, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
