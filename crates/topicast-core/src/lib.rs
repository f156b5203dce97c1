//! Topicast Core: topic research pipeline with a human approval gate.
//!
//! Given a topic, the workflow searches the web in two rounds, keeps a
//! running summary, finalizes it with a source list and then pauses for a
//! human decision before writing short-form and/or long-form posts.
//!
//! The crate has no CLI or HTTP framework dependency. Collaborators (model,
//! search, publishing) are traits so callers and tests can inject their own.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod publish;
pub mod search;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::PipelineConfig;
pub use db::Database;
pub use error::{FailureReport, PipelineError, RunFailure};
pub use state::{AppState, AppStateInner};
pub use workflow::{Collaborators, Snapshot, SnapshotStream, WorkflowEngine};
