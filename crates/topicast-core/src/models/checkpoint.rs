use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::research::ResearchState;
use crate::workflow::NodeId;

/// What the caller is shown when the workflow pauses for approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub topic: String,
    pub summary: String,
}

impl ApprovalRequest {
    pub fn from_state(state: &ResearchState) -> Self {
        Self {
            topic: state.topic.clone(),
            summary: state.running_summary.clone().unwrap_or_default(),
        }
    }
}

/// Execution status persisted alongside the state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Suspended { prompt: ApprovalRequest },
    Completed,
    Failed { error: String },
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Suspended { .. } => "suspended",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// One persisted record per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub session_id: String,
    pub status: RunStatus,
    /// Node that runs next (or is waiting / failed). `End` once completed.
    pub next_node: NodeId,
    pub state: ResearchState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: String, state: ResearchState, entry: NodeId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            status: RunStatus::Running,
            next_node: entry,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at`, always by at least one millisecond so every
    /// write yields a new [`version`](Self::version).
    pub fn touch(&mut self) {
        let floor = self.updated_at + Duration::milliseconds(1);
        self.updated_at = Utc::now().max(floor);
    }

    /// `updated_at` in milliseconds, as stored; used for conditional writes.
    pub fn version(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}
