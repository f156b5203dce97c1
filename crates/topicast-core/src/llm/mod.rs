//! Language model collaborator.
//!
//! Every call is a system instruction plus one user message. Structured
//! calls ask for a JSON object of a known [`OutputSchema`]; the reply is
//! parsed and checked for the schema's keys before it reaches a step.

pub mod caller;
pub mod retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::PipelineError;

pub use caller::HttpModelClient;
pub use retry::RetryingModel;

/// Documented output shapes of the structured calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSchema {
    /// `{query, aspect, rationale}`
    Query,
    /// `{knowledge_gap, follow_up_query}`
    Reflection,
    /// `{tweets: [{content, virality_score, justification}]}`
    ShortFormBatch,
    /// `{posts: [{headline, content, hashtags, effectiveness_score, strategic_value}]}`
    LongFormBatch,
}

impl OutputSchema {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Reflection => "reflection",
            Self::ShortFormBatch => "short_form_batch",
            Self::LongFormBatch => "long_form_batch",
        }
    }

    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Query => &["query", "aspect", "rationale"],
            Self::Reflection => &["knowledge_gap", "follow_up_query"],
            Self::ShortFormBatch => &["tweets"],
            Self::LongFormBatch => &["posts"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json(OutputSchema),
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub format: OutputFormat,
}

impl ModelRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            format: OutputFormat::Text,
        }
    }

    pub fn structured(system: impl Into<String>, user: impl Into<String>, schema: OutputSchema) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            format: OutputFormat::Json(schema),
        }
    }

    pub fn expects_structured(&self) -> bool {
        matches!(self.format, OutputFormat::Json(_))
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Return the raw text of the model's reply.
    async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError>;
}

/// Issue a free-text call.
pub async fn invoke_text(
    model: &dyn LanguageModel,
    system: &str,
    user: &str,
) -> Result<String, PipelineError> {
    model.complete(&ModelRequest::text(system, user)).await
}

/// Issue a structured call and decode the reply into `T`.
///
/// Single attempt: a reply that is not JSON or misses a declared key fails
/// with [`PipelineError::MalformedModelOutput`].
pub async fn invoke_structured<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    system: &str,
    user: &str,
    schema: OutputSchema,
) -> Result<T, PipelineError> {
    let reply = model
        .complete(&ModelRequest::structured(system, user, schema))
        .await?;
    parse_structured(&reply, schema)
}

/// Parse a structured reply, tolerating Markdown fences and chatter around
/// the first complete JSON object.
pub fn parse_structured<T: DeserializeOwned>(reply: &str, schema: OutputSchema) -> Result<T, PipelineError> {
    let value = first_json_object(reply).map_err(|detail| PipelineError::malformed(schema.name(), detail))?;

    let missing: Vec<&str> = schema
        .required_keys()
        .iter()
        .copied()
        .filter(|key| value.get(key).map_or(true, |v| v.is_null()))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::malformed(
            schema.name(),
            format!("missing keys: {}", missing.join(", ")),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| PipelineError::malformed(schema.name(), e.to_string()))
}

/// Decode the first `{` that opens a complete JSON object; trailing text is ignored.
fn first_json_object(reply: &str) -> Result<serde_json::Value, String> {
    let mut first_error = None;
    for (start, _) in reply.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&reply[start..]).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(value)) if value.is_object() => return Ok(value),
            Some(Err(e)) if first_error.is_none() => first_error = Some(format!("invalid JSON: {}", e)),
            _ => {}
        }
    }
    Err(first_error.unwrap_or_else(|| "reply contains no JSON object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Reflection {
        knowledge_gap: String,
        follow_up_query: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let r: Reflection = parse_structured(
            r#"{"knowledge_gap": "cost", "follow_up_query": "quantum battery cost"}"#,
            OutputSchema::Reflection,
        )
        .unwrap();
        assert_eq!(r.knowledge_gap, "cost");
        assert_eq!(r.follow_up_query, "quantum battery cost");
    }

    #[test]
    fn test_parse_fenced_json_with_chatter() {
        let reply = "Here you go:\n```json\n{\"knowledge_gap\": \"g\", \"follow_up_query\": \"q\"}\n```\nHope it helps.";
        let r: Reflection = parse_structured(reply, OutputSchema::Reflection).unwrap();
        assert_eq!(r.follow_up_query, "q");
    }

    #[test]
    fn test_trailing_chatter_with_braces_is_ignored() {
        let reply = r#"{"knowledge_gap": "g", "follow_up_query": "q"} note: try {x} next time"#;
        let r: Reflection = parse_structured(reply, OutputSchema::Reflection).unwrap();
        assert_eq!(r.knowledge_gap, "g");
        assert_eq!(r.follow_up_query, "q");
    }

    #[test]
    fn test_missing_keys_are_reported() {
        let err = parse_structured::<serde_json::Value>(r#"{"query": "q"}"#, OutputSchema::Query)
            .unwrap_err();
        match err {
            PipelineError::MalformedModelOutput { schema, detail } => {
                assert_eq!(schema, "query");
                assert!(detail.contains("aspect"));
                assert!(detail.contains("rationale"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_reply() {
        assert!(matches!(
            parse_structured::<serde_json::Value>("I cannot help with that.", OutputSchema::ShortFormBatch),
            Err(PipelineError::MalformedModelOutput { .. })
        ));
        assert!(matches!(
            parse_structured::<serde_json::Value>("{not json}", OutputSchema::ShortFormBatch),
            Err(PipelineError::MalformedModelOutput { .. })
        ));
    }

    #[test]
    fn test_request_constructors() {
        assert!(!ModelRequest::text("s", "u").expects_structured());
        let req = ModelRequest::structured("s", "u", OutputSchema::LongFormBatch);
        assert_eq!(req.format, OutputFormat::Json(OutputSchema::LongFormBatch));
    }
}
