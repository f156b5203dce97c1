//! Core error type for the Topicast pipeline.
//!
//! `PipelineError` is used throughout the core (steps, collaborators,
//! checkpoint store, configuration). The variants keep "the model answered
//! badly" apart from "the network failed" so callers can react differently.

use serde::Serialize;

use crate::models::ResearchState;
use crate::workflow::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad input to a step, rejected before any external I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A model, search or publishing call failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A structured model response could not be parsed or misses keys.
    #[error("Malformed model output for '{schema}': {detail}")]
    MalformedModelOutput { schema: String, detail: String },

    /// Resume/retry called on a session that is not waiting for it.
    #[error("Suspension protocol error: {0}")]
    SuspensionProtocol(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Short machine-readable kind, used in persisted failure records and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Collaborator(_) => "collaborator",
            Self::MalformedModelOutput { .. } => "malformed_model_output",
            Self::SuspensionProtocol(_) => "suspension_protocol",
            Self::Database(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Config(_) => "config",
        }
    }

    pub fn malformed(schema: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedModelOutput {
            schema: schema.into(),
            detail: detail.into(),
        }
    }
}

/// Terminal item of a failed run: the error plus the last merged state.
#[derive(Debug, thiserror::Error)]
#[error("Workflow failed at '{node}' (session {session_id}): {error}")]
pub struct RunFailure {
    pub session_id: String,
    pub node: NodeId,
    #[source]
    pub error: PipelineError,
    pub state: ResearchState,
}

/// Serializable view of a [`RunFailure`] for JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub session_id: String,
    pub node: NodeId,
    pub kind: &'static str,
    pub message: String,
}

impl From<&RunFailure> for FailureReport {
    fn from(failure: &RunFailure) -> Self {
        Self {
            session_id: failure.session_id.clone(),
            node: failure.node,
            kind: failure.error.kind(),
            message: failure.error.to_string(),
        }
    }
}
