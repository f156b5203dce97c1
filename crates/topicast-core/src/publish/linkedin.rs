//! LinkedIn UGC posts client.
//!
//! GET  {base_url}/userinfo   -> {"sub": "..."} (author URN when not configured)
//! POST {base_url}/ugcPosts   -> id in the `x-restli-id` header

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::config::LinkedInConfig;
use crate::error::PipelineError;
use crate::models::ContentItem;
use crate::publish::{Platform, PublishOptions, PublishReceipt, Publisher, Visibility};

pub struct LinkedInPublisher {
    client: reqwest::Client,
    config: LinkedInConfig,
    author: OnceCell<String>,
}

impl LinkedInPublisher {
    pub fn new(config: &LinkedInConfig) -> Result<Self, PipelineError> {
        super::require_token("publishing.linkedin.access_token", &config.access_token)?;
        let author = OnceCell::new();
        if let Some(urn) = config.person_urn.as_ref().filter(|u| !u.trim().is_empty()) {
            let _ = author.set(urn.clone());
        }
        Ok(Self {
            client: super::http_client(),
            config: config.clone(),
            author,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn author_urn(&self) -> Result<&String, PipelineError> {
        self.author
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(self.url("userinfo"))
                    .bearer_auth(&self.config.access_token)
                    .send()
                    .await
                    .map_err(|e| {
                        PipelineError::Collaborator(format!("LinkedIn userinfo failed: {}", e))
                    })?;
                if !response.status().is_success() {
                    return Err(PipelineError::Collaborator(format!(
                        "LinkedIn userinfo returned {}",
                        response.status()
                    )));
                }
                let json: serde_json::Value = response.json().await.map_err(|e| {
                    PipelineError::Collaborator(format!("Failed to parse LinkedIn userinfo: {}", e))
                })?;
                let sub = json.get("sub").and_then(|v| v.as_str()).ok_or_else(|| {
                    PipelineError::Collaborator("LinkedIn userinfo has no 'sub'".to_string())
                })?;
                tracing::debug!("[Publish] Resolved LinkedIn member {}", sub);
                Ok(format!("urn:li:person:{}", sub))
            })
            .await
    }
}

/// Post text: headline, blank line, body, blank line, hashtags.
pub fn compose_commentary(item: &ContentItem) -> String {
    let mut parts = Vec::new();
    if let Some(headline) = item.headline.as_deref().filter(|h| !h.is_empty()) {
        parts.push(headline.to_string());
    }
    parts.push(item.body.clone());
    let tags: Vec<String> = item
        .hashtags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| if t.starts_with('#') { t.to_string() } else { format!("#{}", t) })
        .collect();
    if !tags.is_empty() {
        parts.push(tags.join(" "));
    }
    parts.join("\n\n")
}

fn ugc_body(author: &str, commentary: &str, visibility: Visibility) -> serde_json::Value {
    serde_json::json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": commentary },
                "shareMediaCategory": "NONE"
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": visibility
        }
    })
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn publish(
        &self,
        item: &ContentItem,
        options: &PublishOptions,
    ) -> Result<PublishReceipt, PipelineError> {
        if item.body.trim().is_empty() {
            return Err(PipelineError::Validation("post body is empty".to_string()));
        }
        let author = self.author_urn().await?.clone();
        let body = ugc_body(&author, &compose_commentary(item), options.visibility);

        tracing::info!("[Publish] Creating LinkedIn post as {}", author);

        let response = self
            .client
            .post(self.url("ugcPosts"))
            .bearer_auth(&self.config.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("LinkedIn request failed: {}", e)))?;

        let status = response.status();
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let text = response.text().await.map_err(|e| {
            PipelineError::Collaborator(format!("Failed to read LinkedIn response: {}", e))
        })?;
        if !status.is_success() {
            return Err(PipelineError::Collaborator(format!(
                "LinkedIn returned {}: {}",
                status, text
            )));
        }

        let post_id = header_id
            .or_else(|| {
                serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|json| json.get("id").and_then(|v| v.as_str()).map(String::from))
            })
            .ok_or_else(|| PipelineError::Collaborator("LinkedIn response has no post id".to_string()))?;

        Ok(PublishReceipt {
            url: Some(format!("https://www.linkedin.com/feed/update/{}", post_id)),
            post_id,
            published_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ContentItem {
        ContentItem {
            body: "Quantum batteries could change grid storage.".to_string(),
            score: 8.0,
            rationale: "Timely".to_string(),
            headline: Some("Why quantum batteries matter".to_string()),
            hashtags: vec!["QuantumTech".to_string(), "#Energy".to_string(), " ".to_string()],
        }
    }

    #[test]
    fn test_compose_commentary() {
        assert_eq!(
            compose_commentary(&item()),
            "Why quantum batteries matter\n\nQuantum batteries could change grid storage.\n\n#QuantumTech #Energy"
        );
    }

    #[test]
    fn test_ugc_body_shape() {
        let body = ugc_body("urn:li:person:42", "hello", Visibility::Connections);
        assert_eq!(body["author"], "urn:li:person:42");
        assert_eq!(
            body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
            "hello"
        );
        assert_eq!(
            body["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"],
            "CONNECTIONS"
        );
    }

    #[tokio::test]
    async fn test_configured_urn_skips_lookup() {
        let config = LinkedInConfig {
            access_token: "token".to_string(),
            person_urn: Some("urn:li:person:42".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
        };
        let publisher = LinkedInPublisher::new(&config).unwrap();
        assert_eq!(publisher.author_urn().await.unwrap(), "urn:li:person:42");
    }
}
