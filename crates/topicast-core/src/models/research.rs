use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A raw source record collected by a search round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentChannel {
    ShortForm,
    LongForm,
}

impl ContentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortForm => "short_form",
            Self::LongForm => "long_form",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "short_form" | "short" | "tweets" | "x" => Some(Self::ShortForm),
            "long_form" | "long" | "posts" | "linkedin" => Some(Self::LongForm),
            _ => None,
        }
    }
}

impl fmt::Display for ContentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One generated post, normalised across channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub body: String,
    /// Platform-specific score on a 1–10 scale (virality or effectiveness).
    pub score: f64,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
}

/// Human decision taken at the approval gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    ShortForm,
    LongForm,
    Both,
}

/// How unrecognised decision input is treated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Anything other than `t` / `l` selects both channels.
    #[default]
    Lenient,
    /// Only `t`, `l` and `b` are accepted.
    Strict,
}

impl ApprovalDecision {
    /// Parse caller input: `t` → short-form, `l` → long-form (case-insensitive).
    pub fn parse(input: &str, policy: DecisionPolicy) -> Result<Self, PipelineError> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err(PipelineError::SuspensionProtocol(
                "decision must be a non-empty string".to_string(),
            )),
            "t" => Ok(Self::ShortForm),
            "l" => Ok(Self::LongForm),
            "b" => Ok(Self::Both),
            other => match policy {
                DecisionPolicy::Lenient => {
                    tracing::warn!(
                        "[Approval] Unrecognised decision '{}', generating both channels",
                        other
                    );
                    Ok(Self::Both)
                }
                DecisionPolicy::Strict => Err(PipelineError::SuspensionProtocol(format!(
                    "unrecognised decision '{}' (expected t, l or b)",
                    other
                ))),
            },
        }
    }

    pub fn channels(&self) -> &'static [ContentChannel] {
        match self {
            Self::ShortForm => &[ContentChannel::ShortForm],
            Self::LongForm => &[ContentChannel::LongForm],
            Self::Both => &[ContentChannel::ShortForm, ContentChannel::LongForm],
        }
    }
}

/// The record threaded through every workflow step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResearchState {
    pub topic: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub web_research_results: Vec<String>,
    #[serde(default)]
    pub sources_gathered: Vec<Source>,
    #[serde(default)]
    pub research_loop_count: u32,
    #[serde(default)]
    pub running_summary: Option<String>,
    /// Summarizer text `running_summary` was finalized from. Set by Finalize only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_summary: Option<String>,
    #[serde(default)]
    pub generated_content: BTreeMap<ContentChannel, Vec<ContentItem>>,
    #[serde(default)]
    pub pending_decision: Option<ApprovalDecision>,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Shallow-merge a step's partial result into the state.
    ///
    /// Sequences are appended, the loop counter can only move forward by one
    /// and `topic` is never touched.
    pub fn merge(&mut self, patch: StatePatch) {
        if let Some(query) = patch.search_query {
            self.search_query = query;
        }
        self.web_research_results.extend(patch.web_research_results);
        self.sources_gathered.extend(patch.sources_gathered);
        if patch.completed_search_round {
            self.research_loop_count += 1;
        }
        if let Some(summary) = patch.running_summary {
            self.running_summary = Some(summary);
        }
        if let Some(draft) = patch.draft_summary {
            self.draft_summary = Some(draft);
        }
        for (channel, items) in patch.generated_content {
            self.generated_content.insert(channel, items);
        }
        if let Some(decision) = patch.pending_decision {
            self.pending_decision = decision;
        }
    }

    /// True once Finalize has appended the source list.
    pub fn is_finalized(&self) -> bool {
        self.draft_summary.is_some()
    }

    pub fn latest_research(&self) -> Option<&str> {
        self.web_research_results.last().map(String::as_str)
    }

    pub fn content(&self, channel: ContentChannel) -> &[ContentItem] {
        self.generated_content
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Fields changed by one step. Absent fields leave the state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub search_query: Option<String>,
    pub web_research_results: Vec<String>,
    pub sources_gathered: Vec<Source>,
    pub completed_search_round: bool,
    pub running_summary: Option<String>,
    pub draft_summary: Option<String>,
    pub generated_content: BTreeMap<ContentChannel, Vec<ContentItem>>,
    /// `Some(None)` clears the decision, `None` leaves it as is.
    pub pending_decision: Option<Option<ApprovalDecision>>,
}

impl StatePatch {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            search_query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            running_summary: Some(summary.into()),
            ..Default::default()
        }
    }

    pub fn decision(decision: ApprovalDecision) -> Self {
        Self {
            pending_decision: Some(Some(decision)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str) -> Source {
        Source {
            url: url.to_string(),
            title: None,
            score: None,
            published_date: None,
            content: None,
        }
    }

    #[test]
    fn test_decision_parsing_is_case_insensitive() {
        let lenient = DecisionPolicy::Lenient;
        assert_eq!(ApprovalDecision::parse("t", lenient).unwrap(), ApprovalDecision::ShortForm);
        assert_eq!(ApprovalDecision::parse("T", lenient).unwrap(), ApprovalDecision::ShortForm);
        assert_eq!(ApprovalDecision::parse(" L ", lenient).unwrap(), ApprovalDecision::LongForm);
        assert_eq!(ApprovalDecision::parse("yes please", lenient).unwrap(), ApprovalDecision::Both);
    }

    #[test]
    fn test_decision_rejects_empty_and_strict_unknown() {
        assert!(matches!(
            ApprovalDecision::parse("   ", DecisionPolicy::Lenient),
            Err(PipelineError::SuspensionProtocol(_))
        ));
        assert!(matches!(
            ApprovalDecision::parse("maybe", DecisionPolicy::Strict),
            Err(PipelineError::SuspensionProtocol(_))
        ));
        assert_eq!(
            ApprovalDecision::parse("b", DecisionPolicy::Strict).unwrap(),
            ApprovalDecision::Both
        );
    }

    #[test]
    fn test_merge_appends_and_counts() {
        let mut state = ResearchState::new("quantum batteries");
        state.merge(StatePatch {
            web_research_results: vec!["round one".to_string()],
            sources_gathered: vec![source("https://a.example")],
            completed_search_round: true,
            ..Default::default()
        });
        state.merge(StatePatch {
            web_research_results: vec!["round two".to_string()],
            sources_gathered: vec![source("https://a.example")],
            completed_search_round: true,
            ..Default::default()
        });

        assert_eq!(state.topic, "quantum batteries");
        assert_eq!(state.research_loop_count, 2);
        assert_eq!(state.web_research_results.len(), 2);
        assert_eq!(state.latest_research(), Some("round two"));
        // Not deduplicated until finalization.
        assert_eq!(state.sources_gathered.len(), 2);
    }

    #[test]
    fn test_merge_leaves_untouched_fields() {
        let mut state = ResearchState::new("topic");
        state.merge(StatePatch::summary("first"));
        state.merge(StatePatch::query("next query"));
        assert_eq!(state.running_summary.as_deref(), Some("first"));
        assert_eq!(state.search_query, "next query");

        state.merge(StatePatch::decision(ApprovalDecision::LongForm));
        assert_eq!(state.pending_decision, Some(ApprovalDecision::LongForm));
        state.merge(StatePatch {
            pending_decision: Some(None),
            ..Default::default()
        });
        assert_eq!(state.pending_decision, None);
    }

    #[test]
    fn test_state_serializes_channel_keys() {
        let mut state = ResearchState::new("topic");
        state.generated_content.insert(
            ContentChannel::ShortForm,
            vec![ContentItem {
                body: "hello".to_string(),
                score: 7.0,
                rationale: "short".to_string(),
                headline: None,
                hashtags: vec![],
            }],
        );
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["generated_content"]["short_form"][0]["body"], "hello");

        let back: ResearchState = serde_json::from_value(json).unwrap();
        assert_eq!(back.content(ContentChannel::ShortForm).len(), 1);
        assert!(back.content(ContentChannel::LongForm).is_empty());
    }

    #[test]
    fn test_channel_parse_aliases() {
        assert_eq!(ContentChannel::parse("short-form"), Some(ContentChannel::ShortForm));
        assert_eq!(ContentChannel::parse("LONG_FORM"), Some(ContentChannel::LongForm));
        assert_eq!(ContentChannel::parse("video"), None);
    }
}
