//! Publishing collaborators: push a finished content item to a social platform.

pub mod linkedin;
pub mod x;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::ContentItem;

pub use linkedin::LinkedInPublisher;
pub use x::XPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    LinkedIn,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::LinkedIn => "linkedin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x" | "twitter" => Some(Self::X),
            "linkedin" => Some(Self::LinkedIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    #[default]
    Public,
    Connections,
}

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// LinkedIn audience; ignored by X.
    pub visibility: Visibility,
}

/// What a platform hands back for a created post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub post_id: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(
        &self,
        item: &ContentItem,
        options: &PublishOptions,
    ) -> Result<PublishReceipt, PipelineError>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) fn require_token(name: &str, token: &str) -> Result<(), PipelineError> {
    if token.trim().is_empty() || crate::config::is_unresolved(token) {
        return Err(PipelineError::Config(format!("{} is not set", name)));
    }
    Ok(())
}
