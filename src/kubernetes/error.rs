// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for cluster access, counting and namespace scans.
//!
//! All of them are `Clone`: one in-flight namespace scan hands the same
//! result to every caller waiting on it.

use std::time::Duration;
use thiserror::Error;

/// A failed call against the cluster API
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// The API server answered with an error status
    #[error("API error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// The call did not finish within its time budget
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS, decoding or any other non-API failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    /// HTTP status code, when the API server produced one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClusterError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the status code is one of `codes`
    pub fn has_status(&self, codes: &[u16]) -> bool {
        self.status_code().is_some_and(|code| codes.contains(&code))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => ClusterError::Api {
                code: resp.code,
                reason: resp.reason,
                message: resp.message,
            },
            other => ClusterError::Transport(other.to_string()),
        }
    }
}

/// Counting one resource type in one namespace failed for an unexpected reason.
///
/// Expected denials never become a `CountError`; they resolve to zero.
#[derive(Debug, Clone, Error)]
#[error("failed to count {resource} in namespace '{namespace}': {source}")]
pub struct CountError {
    pub resource: String,
    pub namespace: String,
    #[source]
    pub source: ClusterError,
}

/// Errors surfaced by explorer operations
#[derive(Debug, Clone, Error)]
pub enum ExplorerError {
    /// No cluster connection was established at startup
    #[error("no Kubernetes connection available")]
    Unavailable,

    /// Resource discovery failed outright, with no fallback possible
    #[error("resource discovery failed: {0}")]
    Discovery(#[source] ClusterError),

    /// The identifier matches no namespaced resource type
    #[error("resource {0} not found or not namespaced")]
    UnknownResource(String),

    /// A namespace scan task ended without producing a result
    #[error("scan of namespace '{0}' was aborted")]
    ScanAborted(String),

    /// An object could not be turned into a JSON document
    #[error("invalid object document: {0}")]
    InvalidObject(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ExplorerError {
    /// Whether this maps to a "service unavailable" condition for callers
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExplorerError::Unavailable | ExplorerError::Discovery(_))
    }
}
