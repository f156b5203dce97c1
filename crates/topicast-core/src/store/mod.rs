pub mod checkpoint_store;
pub mod publication_store;

pub use checkpoint_store::{CheckpointStore, CheckpointSummary};
pub use publication_store::{Publication, PublicationStore};
