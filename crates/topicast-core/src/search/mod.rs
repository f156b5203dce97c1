//! Web search collaborator: request contract, validation and formatting
//! of results for the summarizer.

pub mod format;
pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub use format::{format_results, format_value};
pub use tavily::TavilyClient;

/// Largest `max_results` the provider accepts.
pub const MAX_RESULTS_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(PipelineError::Validation(format!(
                "search depth must be 'basic' or 'advanced', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    General,
    News,
}

impl SearchTopic {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "general" => Ok(Self::General),
            "news" => Ok(Self::News),
            other => Err(PipelineError::Validation(format!(
                "search topic must be 'general' or 'news', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s.to_lowercase().as_str() {
            "day" | "d" => Ok(Self::Day),
            "week" | "w" => Ok(Self::Week),
            "month" | "m" => Ok(Self::Month),
            "year" | "y" => Ok(Self::Year),
            other => Err(PipelineError::Validation(format!(
                "invalid time range '{}'",
                other
            ))),
        }
    }
}

/// A validated search request. Build with [`SearchRequest::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    pub topic: SearchTopic,
    pub max_results: u32,
    pub days: Option<u32>,
    pub time_range: Option<TimeRange>,
    pub include_answer: bool,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: &str, depth: &str, topic: &str, max_results: u32) -> Result<Self, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::Validation("search query is empty".to_string()));
        }
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(PipelineError::Validation(format!(
                "max_results must be between 1 and {}, got {}",
                MAX_RESULTS_LIMIT, max_results
            )));
        }
        Ok(Self {
            query: query.to_string(),
            depth: SearchDepth::parse(depth)?,
            topic: SearchTopic::parse(topic)?,
            max_results,
            days: None,
            time_range: None,
            include_answer: false,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        })
    }

    pub fn with_time_range(mut self, range: Option<&str>) -> Result<Self, PipelineError> {
        self.time_range = range.map(TimeRange::parse).transpose()?;
        Ok(self)
    }
}

/// One ranked hit. Every field is optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let req = SearchRequest::new("  solid-state batteries ", "advanced", "general", 5).unwrap();
        assert_eq!(req.query, "solid-state batteries");
        assert_eq!(req.depth, SearchDepth::Advanced);

        for (depth, topic, max) in [("deep", "general", 5), ("basic", "sports", 5), ("basic", "news", 0), ("basic", "news", 21)] {
            assert!(matches!(
                SearchRequest::new("q", depth, topic, max),
                Err(PipelineError::Validation(_))
            ));
        }
        assert!(matches!(
            SearchRequest::new("   ", "basic", "general", 5),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_time_range_aliases() {
        let req = SearchRequest::new("q", "basic", "news", 3)
            .unwrap()
            .with_time_range(Some("W"))
            .unwrap();
        assert_eq!(req.time_range, Some(TimeRange::Week));
        assert!(SearchRequest::new("q", "basic", "news", 3)
            .unwrap()
            .with_time_range(Some("fortnight"))
            .is_err());
    }
}
