//! X (Twitter) v2 client.
//!
//! POST {base_url}/2/tweets
//! Headers:
//!   Authorization: Bearer {user-context token}
//! Body: {"text": "..."}

use async_trait::async_trait;
use chrono::Utc;

use crate::config::XConfig;
use crate::error::PipelineError;
use crate::models::ContentItem;
use crate::publish::{Platform, PublishOptions, PublishReceipt, Publisher};

pub const MAX_TWEET_CHARS: usize = 280;

pub struct XPublisher {
    client: reqwest::Client,
    config: XConfig,
}

impl XPublisher {
    pub fn new(config: &XConfig) -> Result<Self, PipelineError> {
        super::require_token("publishing.x.bearer_token", &config.bearer_token)?;
        Ok(Self {
            client: super::http_client(),
            config: config.clone(),
        })
    }
}

/// Reject bodies the API would refuse, before any request is made.
pub fn validate_tweet(text: &str) -> Result<(), PipelineError> {
    let len = text.chars().count();
    if text.trim().is_empty() {
        return Err(PipelineError::Validation("tweet text is empty".to_string()));
    }
    if len > MAX_TWEET_CHARS {
        return Err(PipelineError::Validation(format!(
            "tweet is {} characters, limit is {}",
            len, MAX_TWEET_CHARS
        )));
    }
    Ok(())
}

#[async_trait]
impl Publisher for XPublisher {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn publish(
        &self,
        item: &ContentItem,
        _options: &PublishOptions,
    ) -> Result<PublishReceipt, PipelineError> {
        validate_tweet(&item.body)?;

        let url = format!("{}/2/tweets", self.config.base_url.trim_end_matches('/'));
        tracing::info!("[Publish] Posting tweet ({} chars)", item.body.chars().count());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.bearer_token)
            .json(&serde_json::json!({ "text": item.body }))
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("X request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PipelineError::Collaborator(format!("Failed to read X response: {}", e))
        })?;
        if !status.is_success() {
            return Err(PipelineError::Collaborator(format!(
                "X returned {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Collaborator(format!("Failed to parse X response: {}", e)))?;
        let post_id = json
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::Collaborator("X response has no data.id".to_string()))?
            .to_string();

        Ok(PublishReceipt {
            url: Some(format!("https://x.com/i/web/status/{}", post_id)),
            post_id,
            published_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tweet_length() {
        assert!(validate_tweet("Quantum batteries charge faster as they get bigger.").is_ok());
        assert!(validate_tweet(&"a".repeat(280)).is_ok());
        assert!(matches!(
            validate_tweet(&"a".repeat(281)),
            Err(PipelineError::Validation(_))
        ));
        assert!(validate_tweet("   ").is_err());
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        assert!(validate_tweet(&"⚡".repeat(280)).is_ok());
    }

    #[test]
    fn test_new_requires_token() {
        let config = XConfig {
            bearer_token: "${X_BEARER_TOKEN}".to_string(),
            base_url: "https://api.twitter.com".to_string(),
        };
        assert!(matches!(XPublisher::new(&config), Err(PipelineError::Config(_))));
    }
}
