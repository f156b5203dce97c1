//! Tavily search API client.
//!
//! POST {base_url}/search
//! Body: api_key, query, search_depth, topic, max_results, ...

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::PipelineError;
use crate::search::{SearchProvider, SearchRequest, SearchResponse, SearchTopic};

pub struct TavilyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn payload(&self, request: &SearchRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "api_key": self.api_key,
            "query": request.query,
            "search_depth": request.depth,
            "topic": request.topic,
            "max_results": request.max_results,
            "include_images": false,
            "include_image_descriptions": false,
            "include_answer": request.include_answer,
            "include_raw_content": false,
        });

        if let (Some(days), SearchTopic::News) = (request.days, request.topic) {
            body["days"] = serde_json::json!(days);
        }
        if let Some(range) = request.time_range {
            body["time_range"] = serde_json::json!(range);
        }
        if !request.include_domains.is_empty() {
            body["include_domains"] = serde_json::json!(request.include_domains);
        }
        if !request.exclude_domains.is_empty() {
            body["exclude_domains"] = serde_json::json!(request.exclude_domains);
        }
        body
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, PipelineError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));

        tracing::info!(
            "[Search] Tavily query '{}' (depth: {:?}, max: {})",
            request.query,
            request.depth,
            request.max_results
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("Tavily request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PipelineError::Collaborator(format!("Failed to read Tavily response: {}", e))
        })?;

        if !status.is_success() {
            return Err(PipelineError::Collaborator(format!(
                "Tavily returned {}: {}",
                status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            PipelineError::Collaborator(format!("Failed to parse Tavily response: {}", e))
        })
    }
}
