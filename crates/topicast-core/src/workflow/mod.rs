//! Research workflow: a fixed graph of steps over a shared state.
//!
//! # Architecture
//!
//! ```text
//! WorkflowEngine ──► WorkflowGraph (edges, routers)
//!       │
//!       ├──► steps::execute ──► Collaborators (LanguageModel, SearchProvider)
//!       │
//!       └──► CheckpointStore (one record per session, saved after every node)
//! ```

pub mod engine;
pub mod graph;
pub mod prompts;
pub mod steps;

pub use engine::{Snapshot, SnapshotStream, WorkflowEngine};
pub use graph::{route_approval, route_research, Edge, NextStep, NodeId, WorkflowGraph};
pub use steps::{finalize_summary, Collaborators, StepOutcome};
