//! Settles asynchronous request outcomes into typed operation results.
//!
//! Every backend request goes out exactly once. When the outcome comes back
//! it is classified into a [`FailureReason`] or a parsed value, and callers
//! choose whether a failure is terminal or degrades into a fallback value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{HttpError, HttpResult};

/// Why a backend operation did not produce a usable response.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("server returned status {status}")]
    Server { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Lifecycle of a single backend operation as observed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult<T> {
    Pending,
    Success(T),
    FallbackApplied(T, FailureReason),
    Failed(FailureReason),
}

impl<T> OperationResult<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            OperationResult::Success(value) | OperationResult::FallbackApplied(value, _) => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            OperationResult::FallbackApplied(_, reason) | OperationResult::Failed(reason) => {
                Some(reason)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, OperationResult::FallbackApplied(_, _))
    }
}

fn classify(result: HttpResult) -> Result<Vec<u8>, FailureReason> {
    match result {
        Ok(response) if response.is_success() => Ok(response.into_body()),
        Ok(response) => Err(FailureReason::Server {
            status: response.status(),
            body: String::from_utf8_lossy(response.body()).into_owned(),
        }),
        Err(HttpError::Timeout) => Err(FailureReason::Transport("request timed out".to_string())),
        Err(e) => Err(FailureReason::Transport(e.to_string())),
    }
}

/// Settles an outcome where failure is terminal.
pub fn settle<T, P>(result: HttpResult, parse: P) -> OperationResult<T>
where
    P: FnOnce(&[u8]) -> Result<T, FailureReason>,
{
    match classify(result).and_then(|body| parse(&body)) {
        Ok(value) => OperationResult::Success(value),
        Err(reason) => OperationResult::Failed(reason),
    }
}

/// Settles an outcome where failure degrades into a locally produced value.
/// The fallback is only invoked once the outcome is known to have failed.
pub fn settle_with_fallback<T, P, F>(result: HttpResult, parse: P, fallback: F) -> OperationResult<T>
where
    P: FnOnce(&[u8]) -> Result<T, FailureReason>,
    F: FnOnce() -> T,
{
    match classify(result).and_then(|body| parse(&body)) {
        Ok(value) => OperationResult::Success(value),
        Err(reason) => {
            tracing::warn!(%reason, "operation failed, applying fallback");
            OperationResult::FallbackApplied(fallback(), reason)
        }
    }
}

/// Parses a JSON response body, mapping decode failures to
/// [`FailureReason::MalformedResponse`].
pub fn json_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FailureReason> {
    serde_json::from_slice(bytes).map_err(|e| FailureReason::MalformedResponse(e.to_string()))
}
