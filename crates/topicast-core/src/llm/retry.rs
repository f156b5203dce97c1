//! Retry wrapper for flaky model endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::llm::{LanguageModel, ModelRequest};

/// Retries collaborator failures with exponential backoff (base, 2x base, 4x base, ...).
///
/// Malformed output and validation errors are returned as-is.
pub struct RetryingModel {
    inner: Arc<dyn LanguageModel>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingModel {
    pub fn new(inner: Arc<dyn LanguageModel>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

#[async_trait]
impl LanguageModel for RetryingModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.complete(request).await {
                Err(PipelineError::Collaborator(msg)) if attempt < self.max_retries => {
                    let delay = self.base_delay * (1u32 << attempt.min(16));
                    attempt += 1;
                    tracing::warn!(
                        "[ModelClient] Call failed ({}), retrying in {}ms (attempt {}/{})",
                        msg,
                        delay.as_millis(),
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
