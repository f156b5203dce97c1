//! Workflow engine: runs the graph over a persisted [`ResearchState`].
//!
//! Every completed node is merged into the state, checkpointed and yielded
//! as a [`Snapshot`]. The run stops when `End` is reached, when the approval
//! gate suspends, or at the first failing step. A suspended session is
//! continued with [`WorkflowEngine::resume`]; a failed or interrupted one
//! with [`WorkflowEngine::retry`].
//!
//! Every write is conditional on the version the driver last wrote or
//! loaded, so a session has at most one live driver. A resume that is
//! dropped before its first write leaves the session suspended.

use std::pin::Pin;

use serde::Serialize;
use tokio_stream::Stream;

use crate::error::{PipelineError, RunFailure};
use crate::models::{ApprovalDecision, Checkpoint, DecisionPolicy, ResearchState, RunStatus};
use crate::store::CheckpointStore;
use crate::workflow::steps::{self, Collaborators, StepOutcome};
use crate::workflow::{NodeId, WorkflowGraph};

/// State after one node, as seen by the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session_id: String,
    /// Node that just completed (or suspended).
    pub node: NodeId,
    pub status: RunStatus,
    pub state: ResearchState,
}

pub type SnapshotStream<'a> = Pin<Box<dyn Stream<Item = Result<Snapshot, RunFailure>> + Send + 'a>>;

/// Status and version of the stored row a driver expects to overwrite.
#[derive(Debug, Clone, Copy)]
struct Lease {
    status: &'static str,
    version: i64,
}

impl Lease {
    fn of(checkpoint: &Checkpoint) -> Self {
        Self {
            status: checkpoint.status.as_str(),
            version: checkpoint.version(),
        }
    }
}

pub struct WorkflowEngine {
    graph: WorkflowGraph,
    collaborators: Collaborators,
    store: CheckpointStore,
    policy: DecisionPolicy,
}

impl WorkflowEngine {
    pub fn new(collaborators: Collaborators, store: CheckpointStore) -> Result<Self, PipelineError> {
        Ok(Self {
            graph: WorkflowGraph::build()?,
            collaborators,
            store,
            policy: DecisionPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Start a new session for `topic`.
    pub async fn start(&self, topic: &str, session_id: &str) -> Result<SnapshotStream<'_>, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::Validation("topic is empty".to_string()));
        }
        self.run(ResearchState::new(topic), session_id).await
    }

    /// Run the graph from its entry node with a caller-built state.
    pub async fn run(
        &self,
        initial_state: ResearchState,
        session_id: &str,
    ) -> Result<SnapshotStream<'_>, PipelineError> {
        if session_id.trim().is_empty() {
            return Err(PipelineError::Validation("session id is empty".to_string()));
        }
        if initial_state.topic.trim().is_empty() {
            return Err(PipelineError::Validation("topic is empty".to_string()));
        }

        let checkpoint = Checkpoint::new(session_id.to_string(), initial_state, self.graph.entry());
        if !self.store.create(&checkpoint).await? {
            return Err(PipelineError::Conflict(format!(
                "session '{}' already exists",
                session_id
            )));
        }

        tracing::info!(
            "[Workflow] Session {} started for topic '{}'",
            session_id,
            checkpoint.state.topic
        );
        let lease = Lease::of(&checkpoint);
        Ok(self.drive(checkpoint, None, lease))
    }

    /// Continue a suspended session with the human decision.
    pub async fn resume(&self, session_id: &str, decision: &str) -> Result<SnapshotStream<'_>, PipelineError> {
        let mut checkpoint = self.store.get(session_id).await?.ok_or_else(|| {
            PipelineError::SuspensionProtocol(format!("session '{}' has no checkpoint", session_id))
        })?;
        if !checkpoint.status.is_suspended() {
            return Err(PipelineError::SuspensionProtocol(format!(
                "session '{}' is not awaiting a decision (status: {})",
                session_id,
                checkpoint.status.as_str()
            )));
        }
        let decision = ApprovalDecision::parse(decision, self.policy)?;

        tracing::info!("[Workflow] Session {} resumed with {:?}", session_id, decision);
        let lease = Lease::of(&checkpoint);
        checkpoint.status = RunStatus::Running;
        Ok(self.drive(checkpoint, Some(decision), lease))
    }

    /// Re-run a failed or interrupted session from the node that did not
    /// complete.
    ///
    /// A `running` checkpoint is taken over: a driver still attached to it
    /// loses its next write.
    pub async fn retry(&self, session_id: &str) -> Result<SnapshotStream<'_>, PipelineError> {
        let mut checkpoint = self.store.get(session_id).await?.ok_or_else(|| {
            PipelineError::SuspensionProtocol(format!("session '{}' has no checkpoint", session_id))
        })?;
        if !matches!(checkpoint.status, RunStatus::Failed { .. } | RunStatus::Running) {
            return Err(PipelineError::SuspensionProtocol(format!(
                "session '{}' is neither failed nor interrupted (status: {})",
                session_id,
                checkpoint.status.as_str()
            )));
        }

        tracing::info!(
            "[Workflow] Session {} retrying from '{}' (was {})",
            session_id,
            checkpoint.next_node,
            checkpoint.status.as_str()
        );
        let lease = Lease::of(&checkpoint);
        checkpoint.status = RunStatus::Running;
        Ok(self.drive(checkpoint, None, lease))
    }

    pub async fn checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, PipelineError> {
        self.store.get(session_id).await
    }

    /// Write `checkpoint` if the stored row still matches `lease`, then
    /// advance the lease to the new version.
    async fn persist(&self, checkpoint: &mut Checkpoint, lease: &mut Lease) -> Result<(), PipelineError> {
        checkpoint.touch();
        if !self.store.save_if(checkpoint, lease.status, lease.version).await? {
            return Err(PipelineError::Conflict(format!(
                "session '{}' was resumed or retried elsewhere",
                checkpoint.session_id
            )));
        }
        *lease = Lease::of(checkpoint);
        Ok(())
    }

    fn drive(
        &self,
        mut checkpoint: Checkpoint,
        mut decision: Option<ApprovalDecision>,
        mut lease: Lease,
    ) -> SnapshotStream<'_> {
        Box::pin(async_stream::stream! {
            loop {
                let node = checkpoint.next_node;
                if node == NodeId::End {
                    break;
                }

                tracing::debug!("[Workflow] {} -> running '{}'", checkpoint.session_id, node);
                let outcome = steps::execute(node, &checkpoint.state, decision.take(), &self.collaborators).await;

                let advanced = match outcome {
                    Ok(StepOutcome::Suspend(prompt)) => {
                        checkpoint.status = RunStatus::Suspended { prompt };
                        Ok(())
                    }
                    Ok(StepOutcome::Patch(patch)) => {
                        checkpoint.state.merge(patch);
                        self.graph.next(node, &checkpoint.state).map(|next| {
                            checkpoint.next_node = next;
                            if next == NodeId::End {
                                checkpoint.status = RunStatus::Completed;
                            }
                        })
                    }
                    Err(e) => Err(e),
                };

                if let Err(error) = advanced {
                    tracing::error!("[Workflow] {} failed at '{}': {}", checkpoint.session_id, node, error);
                    checkpoint.status = RunStatus::Failed { error: error.to_string() };
                    if let Err(save_err) = self.persist(&mut checkpoint, &mut lease).await {
                        tracing::error!("[Workflow] Could not persist failure: {}", save_err);
                    }
                    yield Err(RunFailure {
                        session_id: checkpoint.session_id.clone(),
                        node,
                        error,
                        state: checkpoint.state.clone(),
                    });
                    break;
                }

                if let Err(error) = self.persist(&mut checkpoint, &mut lease).await {
                    tracing::warn!("[Workflow] {} stopped at '{}': {}", checkpoint.session_id, node, error);
                    yield Err(RunFailure {
                        session_id: checkpoint.session_id.clone(),
                        node,
                        error,
                        state: checkpoint.state.clone(),
                    });
                    break;
                }

                yield Ok(Snapshot {
                    session_id: checkpoint.session_id.clone(),
                    node,
                    status: checkpoint.status.clone(),
                    state: checkpoint.state.clone(),
                });

                match checkpoint.status {
                    RunStatus::Suspended { .. } => {
                        tracing::info!("[Workflow] {} suspended at '{}'", checkpoint.session_id, node);
                        break;
                    }
                    RunStatus::Completed => {
                        tracing::info!("[Workflow] {} completed", checkpoint.session_id);
                        break;
                    }
                    _ => {}
                }
            }
        })
    }
}
