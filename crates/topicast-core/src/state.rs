//! Shared application state: database, stores and configuration.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::db::Database;
use crate::error::PipelineError;
use crate::models::ContentChannel;
use crate::publish::{LinkedInPublisher, Platform, PublishOptions, Publisher, XPublisher};
use crate::store::{CheckpointStore, Publication, PublicationStore};
use crate::workflow::{Collaborators, WorkflowEngine};

pub struct AppStateInner {
    pub db: Database,
    pub config: PipelineConfig,
    pub checkpoint_store: CheckpointStore,
    pub publication_store: PublicationStore,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database, config: PipelineConfig) -> Self {
        Self {
            checkpoint_store: CheckpointStore::new(db.clone()),
            publication_store: PublicationStore::new(db.clone()),
            db,
            config,
        }
    }

    /// Engine over the given collaborators, with the configured decision policy.
    pub fn engine(&self, collaborators: Collaborators) -> Result<WorkflowEngine, PipelineError> {
        Ok(WorkflowEngine::new(collaborators, CheckpointStore::new(self.db.clone()))?
            .with_policy(self.config.approval.policy))
    }

    /// Engine over the HTTP collaborators described by the configuration.
    pub fn engine_from_config(&self) -> Result<WorkflowEngine, PipelineError> {
        self.engine(Collaborators::from_config(&self.config)?)
    }

    pub fn publisher(&self, platform: Platform) -> Result<Box<dyn Publisher>, PipelineError> {
        let publishing = &self.config.publishing;
        match platform {
            Platform::X => {
                let cfg = publishing.x.as_ref().ok_or_else(|| {
                    PipelineError::Config("publishing.x is not configured".to_string())
                })?;
                Ok(Box::new(XPublisher::new(cfg)?))
            }
            Platform::LinkedIn => {
                let cfg = publishing.linkedin.as_ref().ok_or_else(|| {
                    PipelineError::Config("publishing.linkedin is not configured".to_string())
                })?;
                Ok(Box::new(LinkedInPublisher::new(cfg)?))
            }
        }
    }

    /// Publish one generated item of a session and record the receipt.
    pub async fn publish(
        &self,
        publisher: &dyn Publisher,
        session_id: &str,
        channel: ContentChannel,
        index: usize,
        options: &PublishOptions,
    ) -> Result<Publication, PipelineError> {
        let checkpoint = self
            .checkpoint_store
            .get(session_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("session '{}'", session_id)))?;

        let items = checkpoint.state.content(channel);
        let item = items.get(index).ok_or_else(|| {
            PipelineError::Validation(format!(
                "session '{}' has {} {} items, no index {}",
                session_id,
                items.len(),
                channel,
                index
            ))
        })?;

        let receipt = publisher.publish(item, options).await?;
        tracing::info!(
            "[Publish] {} item {} of {} published to {} as {}",
            channel,
            index,
            session_id,
            publisher.platform(),
            receipt.post_id
        );
        self.publication_store
            .record(session_id, channel, index, publisher.platform(), &receipt)
            .await
    }
}
