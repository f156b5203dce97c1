//! YAML configuration for the pipeline collaborators.
//!
//! ```yaml
//! model:
//!   adapter: openai          # openai | anthropic
//!   base_url: https://api.groq.com/openai/v1
//!   api_key: ${GROQ_API_KEY}
//!   model: llama-3.3-70b-versatile
//!   max_retries: 2
//!
//! search:
//!   api_key: ${TAVILY_API_KEY}
//!   depth: advanced
//!   max_results: 5
//!
//! approval:
//!   policy: lenient
//!
//! publishing:
//!   x:
//!     bearer_token: ${X_BEARER_TOKEN}
//! ```
//!
//! Every string field accepts `${VAR}` and `${VAR:-default}` references,
//! resolved from the environment by [`PipelineConfig::resolve_env`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::DecisionPolicy;
use crate::search::SearchRequest;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub publishing: PublishingConfig,
}

/// Language model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Adapter type: "openai" (chat/completions) or "anthropic" (messages)
    #[serde(default = "default_adapter")]
    pub adapter: String,

    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    #[serde(default = "default_model_api_key")]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed call (collaborator errors only)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_adapter() -> String {
    "openai".to_string()
}

fn default_model_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model_api_key() -> String {
    "${GROQ_API_KEY}".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> Option<f64> {
    Some(0.0)
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            base_url: default_model_base_url(),
            api_key: default_model_api_key(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Web search provider settings. Enumerated fields stay strings here and
/// are validated when a request is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_api_key")]
    pub api_key: String,

    /// "basic" or "advanced"
    #[serde(default = "default_depth")]
    pub depth: String,

    /// "general" or "news"
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Days back, only honoured for news searches
    #[serde(default)]
    pub days: Option<u32>,

    #[serde(default)]
    pub time_range: Option<String>,

    #[serde(default)]
    pub include_domains: Vec<String>,

    #[serde(default)]
    pub exclude_domains: Vec<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_api_key() -> String {
    "${TAVILY_API_KEY}".to_string()
}

fn default_depth() -> String {
    "advanced".to_string()
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_max_results() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: default_search_api_key(),
            depth: default_depth(),
            topic: default_topic(),
            max_results: default_max_results(),
            days: None,
            time_range: None,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl SearchConfig {
    /// Build a validated request for `query` using these defaults.
    pub fn request_for(&self, query: &str) -> Result<SearchRequest, PipelineError> {
        let mut request = SearchRequest::new(query, &self.depth, &self.topic, self.max_results)?;
        request = request.with_time_range(self.time_range.as_deref())?;
        request.days = self.days;
        request.include_domains = self.include_domains.clone();
        request.exclude_domains = self.exclude_domains.clone();
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub policy: DecisionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PublishingConfig {
    #[serde(default)]
    pub x: Option<XConfig>,

    #[serde(default)]
    pub linkedin: Option<LinkedInConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    /// OAuth 2.0 user-context token with `tweet.write`
    pub bearer_token: String,

    #[serde(default = "default_x_base_url")]
    pub base_url: String,
}

fn default_x_base_url() -> String {
    "https://api.twitter.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    /// OAuth 2.0 token with `w_member_social`
    pub access_token: String,

    /// `urn:li:person:...`; looked up via `/v2/userinfo` when absent
    #[serde(default)]
    pub person_urn: Option<String>,

    #[serde(default = "default_linkedin_base_url")]
    pub base_url: String,
}

fn default_linkedin_base_url() -> String {
    "https://api.linkedin.com/v2".to_string()
}

impl PipelineConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    /// Load a configuration from a file path.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, PipelineError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!("[Config] '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Expand `${VAR}` references in every string setting.
    pub fn resolve_env(mut self) -> Self {
        let m = &mut self.model;
        for field in [&mut m.adapter, &mut m.base_url, &mut m.api_key, &mut m.model] {
            let resolved = resolve_env_vars(field);
            *field = resolved;
        }

        let s = &mut self.search;
        for field in [&mut s.base_url, &mut s.api_key, &mut s.depth, &mut s.topic] {
            let resolved = resolve_env_vars(field);
            *field = resolved;
        }
        if let Some(range) = s.time_range.as_mut() {
            let resolved = resolve_env_vars(range);
            *range = resolved;
        }

        if let Some(x) = self.publishing.x.as_mut() {
            x.bearer_token = resolve_env_vars(&x.bearer_token);
            x.base_url = resolve_env_vars(&x.base_url);
        }
        if let Some(li) = self.publishing.linkedin.as_mut() {
            li.access_token = resolve_env_vars(&li.access_token);
            li.base_url = resolve_env_vars(&li.base_url);
            if let Some(urn) = li.person_urn.as_mut() {
                let resolved = resolve_env_vars(urn);
                *urn = resolved;
            }
        }
        self
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.model.api_key = mask(&copy.model.api_key);
        copy.search.api_key = mask(&copy.search.api_key);
        if let Some(x) = copy.publishing.x.as_mut() {
            x.bearer_token = mask(&x.bearer_token);
        }
        if let Some(li) = copy.publishing.linkedin.as_mut() {
            li.access_token = mask(&li.access_token);
        }
        copy
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() || is_unresolved(secret) {
        return secret.to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}

/// True while a value still holds an unexpanded `${...}` reference.
pub fn is_unresolved(value: &str) -> bool {
    ENV_REF.is_match(value)
}

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid"));

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            let var_expr = &caps[1];
            if let Some(idx) = var_expr.find(":-") {
                let var_name = &var_expr[..idx];
                let default_val = &var_expr[idx + 2..];
                std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
            } else {
                std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TOPICAST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${TOPICAST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix-${TOPICAST_TEST_VAR}-suffix"),
            "prefix-hello-suffix"
        );
        assert_eq!(resolve_env_vars("${TOPICAST_NONEXISTENT:-fallback}"), "fallback");
        assert_eq!(resolve_env_vars("${TOPICAST_NONEXISTENT}"), "${TOPICAST_NONEXISTENT}");
        std::env::remove_var("TOPICAST_TEST_VAR");
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = PipelineConfig::from_yaml("{}").unwrap();
        assert_eq!(config.model.adapter, "openai");
        assert_eq!(config.model.max_retries, 2);
        assert_eq!(config.search.depth, "advanced");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.approval.policy, DecisionPolicy::Lenient);
        assert!(config.publishing.x.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
model:
  adapter: anthropic
  base_url: https://api.anthropic.com
  api_key: ${TOPICAST_CFG_KEY:-sk-test}
  model: claude-sonnet-4-20250514
  temperature: 0.2
  max_retries: 4
search:
  depth: basic
  topic: news
  days: 3
  max_results: 8
  include_domains: [arxiv.org]
approval:
  policy: strict
publishing:
  linkedin:
    access_token: abc
    person_urn: urn:li:person:42
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap().resolve_env();
        assert_eq!(config.model.adapter, "anthropic");
        assert_eq!(config.model.api_key, "sk-test");
        assert_eq!(config.model.max_retries, 4);
        assert_eq!(config.search.topic, "news");
        assert_eq!(config.search.days, Some(3));
        assert_eq!(config.approval.policy, DecisionPolicy::Strict);
        let li = config.publishing.linkedin.as_ref().unwrap();
        assert_eq!(li.base_url, "https://api.linkedin.com/v2");
        assert_eq!(li.person_urn.as_deref(), Some("urn:li:person:42"));

        let request = config.search.request_for("solid state batteries").unwrap();
        assert_eq!(request.max_results, 8);
        assert_eq!(request.days, Some(3));
    }

    #[test]
    fn test_invalid_depth_fails_when_building_request() {
        let config = PipelineConfig::from_yaml("search:\n  depth: deep\n").unwrap();
        assert!(matches!(
            config.search.request_for("q"),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = PipelineConfig::default();
        config.model.api_key = "gsk_abcdef123".to_string();
        let shown = config.redacted();
        assert_eq!(shown.model.api_key, "gsk_…");
        assert_eq!(shown.search.api_key, "${TAVILY_API_KEY}");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("none.yaml")).unwrap();
        assert_eq!(config.model.model, "llama-3.3-70b-versatile");
    }
}
