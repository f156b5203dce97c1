//! HTTP model client for OpenAI-compatible and Anthropic-compatible APIs.
//!
//! The default configuration targets Groq's OpenAI-compatible endpoint.

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::PipelineError;
use crate::llm::{LanguageModel, ModelRequest, OutputFormat};

const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adapter {
    OpenAi,
    Anthropic,
}

impl Adapter {
    fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "openai" | "groq" | "opencode" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(PipelineError::Config(format!(
                "Unknown model adapter: '{}'",
                other
            ))),
        }
    }
}

/// Calls a chat model over HTTP.
pub struct HttpModelClient {
    client: reqwest::Client,
    adapter: Adapter,
    config: ModelConfig,
}

impl HttpModelClient {
    pub fn new(config: &ModelConfig) -> Result<Self, PipelineError> {
        if config.api_key.trim().is_empty() || crate::config::is_unresolved(&config.api_key) {
            return Err(PipelineError::Config(format!(
                "model API key is not set (got '{}')",
                config.api_key
            )));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            adapter: Adapter::parse(&config.adapter)?,
            config: config.clone(),
        })
    }

    fn temperature(&self) -> Option<serde_json::Value> {
        self.config.temperature.map(|temp| {
            serde_json::Value::Number(
                serde_json::Number::from_f64(temp).unwrap_or_else(|| serde_json::Number::from(0)),
            )
        })
    }

    fn openai_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut messages = vec![];
        if !request.system.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.user
        }));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages
        });
        if let Some(temp) = self.temperature() {
            body["temperature"] = temp;
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let OutputFormat::Json(_) = request.format {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    fn anthropic_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut user = request.user.clone();
        if let OutputFormat::Json(schema) = request.format {
            user.push_str(&format!(
                "\n\nRespond with a single JSON object with the keys: {}.",
                schema.required_keys().join(", ")
            ));
        }

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            "messages": [
                {
                    "role": "user",
                    "content": user
                }
            ]
        });
        if !request.system.is_empty() {
            body["system"] = serde_json::Value::String(request.system.clone());
        }
        if let Some(temp) = self.temperature() {
            body["temperature"] = temp;
        }
        body
    }

    /// POST {base_url}/chat/completions with `Authorization: Bearer`.
    async fn call_openai(&self, request: &ModelRequest) -> Result<String, PipelineError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        tracing::debug!("[ModelClient] POST {} (model: {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&self.openai_body(request))
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("HTTP request failed: {}", e)))?;

        let json = read_json(response).await?;
        extract_openai_content(&json)
    }

    /// POST {base_url}/v1/messages with `x-api-key` and `anthropic-version`.
    async fn call_anthropic(&self, request: &ModelRequest) -> Result<String, PipelineError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        tracing::debug!("[ModelClient] POST {} (model: {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&self.anthropic_body(request))
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("HTTP request failed: {}", e)))?;

        let json = read_json(response).await?;
        extract_anthropic_content(&json)
    }
}

#[async_trait]
impl LanguageModel for HttpModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError> {
        match self.adapter {
            Adapter::OpenAi => self.call_openai(request).await,
            Adapter::Anthropic => self.call_anthropic(request).await,
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, PipelineError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| {
        PipelineError::Collaborator(format!("Failed to read response body: {}", e))
    })?;

    if !status.is_success() {
        return Err(PipelineError::Collaborator(format!(
            "API returned {}: {}",
            status, text
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| PipelineError::Collaborator(format!("Failed to parse response JSON: {}", e)))
}

fn extract_openai_content(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| PipelineError::Collaborator("response has no message content".to_string()))
}

fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| {
            arr.iter()
                .filter_map(|block| {
                    if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                        block.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                    } else {
                        None
                    }
                })
                .reduce(|a, b| format!("{}\n{}", a, b))
        })
        .ok_or_else(|| PipelineError::Collaborator("response has no text blocks".to_string()))
}
