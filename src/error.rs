//! Error types for volume admission
//!
//! Lookup failures (Kubernetes API, missing objects, default storage class
//! discovery) abort the evaluation of a pod. Limit violations are regular
//! admission decisions and are reported through the same enum so the
//! scheduling loop can reject a candidate placement with `?`.

use thiserror::Error;

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("discovering default storage class, {0}")]
    DefaultStorageClass(#[source] Box<Error>),

    // =========================================================================
    // Admission Errors
    // =========================================================================
    #[error("would exceed volume limit for {driver}, {proposed} > {limit}")]
    VolumeLimitExceeded {
        driver: String,
        proposed: usize,
        limit: i64,
    },

    #[error("Node not tracked: {node}")]
    NodeNotFound { node: String },

    // =========================================================================
    // Snapshot Errors
    // =========================================================================
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a missing API object
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::ResourceNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True when the error is a placement decision rather than a fault
    pub fn is_admission_rejection(&self) -> bool {
        matches!(self, Error::VolumeLimitExceeded { .. })
    }

    /// Check if this error is transient
    ///
    /// Only server-side API failures and connection failures count.
    /// Retrying is left to the caller; nothing in this crate retries.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(resp)) => resp.code >= 500 || resp.code == 429,
            Error::Kube(kube::Error::HyperError(_) | kube::Error::Service(_)) => true,
            Error::DefaultStorageClass(source) => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
