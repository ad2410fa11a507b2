//! Error kinds surfaced at the workflow's collaborator boundaries.
//!
//! Only [`HandoffProtocolError`] terminates a run. The other kinds are
//! absorbed where they occur and recorded as annotations on the affected
//! section or on the run result.

use std::path::PathBuf;

use thiserror::Error;

/// A specialist call (evaluator, validator, generator) failed.
#[derive(Debug, Error)]
pub enum SpecialistServiceError {
    /// The call did not return within its bound.
    #[error("{service} timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    /// The backing implementation reported an error.
    #[error("{service} failed: {reason}")]
    Failed { service: &'static str, reason: String },

    /// The result could not be parsed or violated its contract.
    #[error("{service} returned a malformed result: {reason}")]
    Malformed { service: &'static str, reason: String },
}

/// Knowledge retrieval failed. Never blocks a section.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("knowledge base unavailable: {0}")]
    Unavailable(String),

    #[error("invalid knowledge base pattern: {0}")]
    Pattern(String),

    #[error("knowledge retrieval timed out after {0}s")]
    Timeout(u64),

    #[error("failed to read knowledge file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisting a finished document failed. Attached to the run result as a warning.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The human channel closed or became unavailable mid-wait.
#[derive(Debug, Error)]
pub enum HandoffProtocolError {
    #[error("human channel closed")]
    ChannelClosed,

    #[error("human channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`crate::orchestrator::WorkflowOrchestrator::start_run`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid section catalog: {0}")]
    InvalidCatalog(String),

    #[error(transparent)]
    Handoff(#[from] HandoffProtocolError),

    #[error("run cancelled")]
    Cancelled,
}
