//! Store for workflow checkpoints.
//!
//! One row per session: the full `ResearchState`, the run status and the
//! node to execute next. Rows are overwritten after every completed step.

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::PipelineError;
use crate::models::{Checkpoint, ResearchState, RunStatus};
use crate::workflow::NodeId;

/// Lightweight listing entry (no state payload).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub session_id: String,
    pub topic: String,
    pub status: String,
    pub next_node: String,
    pub updated_at: i64,
}

pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite the checkpoint for its session.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), PipelineError> {
        let cp = checkpoint.clone();
        let status_detail = serde_json::to_string(&cp.status)
            .map_err(|e| PipelineError::Database(format!("Failed to encode status: {}", e)))?;
        let state = serde_json::to_string(&cp.state)
            .map_err(|e| PipelineError::Database(format!("Failed to encode state: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO checkpoints
                        (session_id, topic, status, status_detail, next_node, state, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(session_id) DO UPDATE SET
                       status = excluded.status,
                       status_detail = excluded.status_detail,
                       next_node = excluded.next_node,
                       state = excluded.state,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        cp.session_id,
                        cp.state.topic,
                        cp.status.as_str(),
                        status_detail,
                        cp.next_node.as_str(),
                        state,
                        cp.created_at.timestamp_millis(),
                        cp.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Insert a new session; `false` if the session id is already taken.
    pub async fn create(&self, checkpoint: &Checkpoint) -> Result<bool, PipelineError> {
        let cp = checkpoint.clone();
        let status_detail = serde_json::to_string(&cp.status)
            .map_err(|e| PipelineError::Database(format!("Failed to encode status: {}", e)))?;
        let state = serde_json::to_string(&cp.state)
            .map_err(|e| PipelineError::Database(format!("Failed to encode state: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO checkpoints
                        (session_id, topic, status, status_detail, next_node, state, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        cp.session_id,
                        cp.state.topic,
                        cp.status.as_str(),
                        status_detail,
                        cp.next_node.as_str(),
                        state,
                        cp.created_at.timestamp_millis(),
                        cp.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(n == 1)
            })
            .await
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>, PipelineError> {
        let id = session_id.to_string();
        let row = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, status_detail, next_node, state, created_at, updated_at
                     FROM checkpoints WHERE session_id = ?1",
                )?;
                stmt.query_row([&id], |row| {
                    Ok(RawCheckpoint {
                        session_id: row.get(0)?,
                        status_detail: row.get(1)?,
                        next_node: row.get(2)?,
                        state: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                })
                .optional()
            })
            .await?;

        row.map(RawCheckpoint::decode).transpose()
    }

    /// Most recently updated sessions first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<CheckpointSummary>, PipelineError> {
        let limit = limit.unwrap_or(100) as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, topic, status, next_node, updated_at
                     FROM checkpoints ORDER BY updated_at DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit], |row| {
                        Ok(CheckpointSummary {
                            session_id: row.get(0)?,
                            topic: row.get(1)?,
                            status: row.get(2)?,
                            next_node: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, PipelineError> {
        let id = session_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute("DELETE FROM checkpoints WHERE session_id = ?1", [&id])?;
                Ok(n > 0)
            })
            .await
    }

    /// Overwrite the checkpoint only if the stored row still has
    /// `expected_status` and `expected_version` (its `updated_at` in millis).
    ///
    /// Returns `false` when the session is missing or was written by someone
    /// else in between, so two drivers of one session cannot both proceed.
    pub async fn save_if(
        &self,
        checkpoint: &Checkpoint,
        expected_status: &'static str,
        expected_version: i64,
    ) -> Result<bool, PipelineError> {
        let cp = checkpoint.clone();
        let status_detail = serde_json::to_string(&cp.status)
            .map_err(|e| PipelineError::Database(format!("Failed to encode status: {}", e)))?;
        let state = serde_json::to_string(&cp.state)
            .map_err(|e| PipelineError::Database(format!("Failed to encode state: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "UPDATE checkpoints
                     SET status = ?1, status_detail = ?2, next_node = ?3, state = ?4, updated_at = ?5
                     WHERE session_id = ?6 AND status = ?7 AND updated_at = ?8",
                    rusqlite::params![
                        cp.status.as_str(),
                        status_detail,
                        cp.next_node.as_str(),
                        state,
                        cp.version(),
                        cp.session_id,
                        expected_status,
                        expected_version,
                    ],
                )?;
                Ok(n == 1)
            })
            .await
    }
}

struct RawCheckpoint {
    session_id: String,
    status_detail: String,
    next_node: String,
    state: String,
    created_at: i64,
    updated_at: i64,
}

impl RawCheckpoint {
    fn decode(self) -> Result<Checkpoint, PipelineError> {
        let status: RunStatus = serde_json::from_str(&self.status_detail).map_err(|e| {
            PipelineError::Database(format!("Corrupt status for '{}': {}", self.session_id, e))
        })?;
        let state: ResearchState = serde_json::from_str(&self.state).map_err(|e| {
            PipelineError::Database(format!("Corrupt state for '{}': {}", self.session_id, e))
        })?;
        let next_node = NodeId::parse(&self.next_node).ok_or_else(|| {
            PipelineError::Database(format!(
                "Unknown node '{}' for '{}'",
                self.next_node, self.session_id
            ))
        })?;
        Ok(Checkpoint {
            session_id: self.session_id,
            status,
            next_node,
            state,
            created_at: Utc
                .timestamp_millis_opt(self.created_at)
                .single()
                .unwrap_or_else(Utc::now),
            updated_at: Utc
                .timestamp_millis_opt(self.updated_at)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}
