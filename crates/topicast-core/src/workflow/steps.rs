//! Step contracts. Each step reads the state and returns only the fields it
//! changed; the engine merges them.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::{PipelineConfig, SearchConfig};
use crate::error::PipelineError;
use crate::llm::{self, HttpModelClient, LanguageModel, OutputSchema, RetryingModel};
use crate::models::{
    ApprovalDecision, ApprovalRequest, ContentChannel, ContentItem, ResearchState, Source,
    StatePatch,
};
use crate::search::{format_results, SearchProvider, TavilyClient};
use crate::workflow::prompts;
use crate::workflow::NodeId;

pub const SUMMARY_HEADER: &str = "## Summary\n\n";
pub const SOURCES_MARKER: &str = "\n\n### Sources:\n";

const SCORE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=10.0;
const EXPECTED_TWEETS: usize = 10;

/// External capabilities the steps call. Passed in, never global.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchProvider>,
    pub search_config: SearchConfig,
}

impl Collaborators {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            search_config: SearchConfig::default(),
        }
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    /// HTTP clients from configuration; the model client retries transient failures.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let http: Arc<dyn LanguageModel> = Arc::new(HttpModelClient::new(&config.model)?);
        let model = Arc::new(RetryingModel::new(http, config.model.max_retries));
        if crate::config::is_unresolved(&config.search.api_key) {
            return Err(PipelineError::Config(format!(
                "search API key is not set (got '{}')",
                config.search.api_key
            )));
        }
        Ok(Self::new(model, Arc::new(TavilyClient::new(&config.search)))
            .with_search_config(config.search.clone()))
    }
}

/// What running a node produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Patch(StatePatch),
    /// The node needs a human decision before it can complete.
    Suspend(ApprovalRequest),
}

pub async fn execute(
    node: NodeId,
    state: &ResearchState,
    decision: Option<ApprovalDecision>,
    collaborators: &Collaborators,
) -> Result<StepOutcome, PipelineError> {
    let patch = match node {
        NodeId::GenerateQuery => generate_query(collaborators, state).await?,
        NodeId::WebResearch => web_research(collaborators, state).await?,
        NodeId::Summarize => summarize(collaborators, state).await?,
        NodeId::Reflect => reflect(collaborators, state).await?,
        NodeId::Finalize => finalize(state)?,
        NodeId::HumanApproval => return Ok(human_approval(state, decision)),
        NodeId::ShortForm => write_content(collaborators, state, &[ContentChannel::ShortForm]).await?,
        NodeId::LongForm => write_content(collaborators, state, &[ContentChannel::LongForm]).await?,
        NodeId::Both => {
            write_content(
                collaborators,
                state,
                &[ContentChannel::ShortForm, ContentChannel::LongForm],
            )
            .await?
        }
        NodeId::End => StatePatch::default(),
    };
    Ok(StepOutcome::Patch(patch))
}

#[derive(Debug, Deserialize)]
struct QueryPlan {
    query: String,
    #[serde(default)]
    aspect: String,
    #[serde(default)]
    rationale: String,
}

pub async fn generate_query(
    c: &Collaborators,
    state: &ResearchState,
) -> Result<StatePatch, PipelineError> {
    let plan: QueryPlan = llm::invoke_structured(
        c.model.as_ref(),
        &prompts::query_writer(&state.topic),
        prompts::QUERY_WRITER_USER,
        OutputSchema::Query,
    )
    .await?;

    let query = plan.query.trim();
    if query.is_empty() {
        return Err(PipelineError::malformed(OutputSchema::Query.name(), "query is empty"));
    }
    tracing::info!("[Workflow] Query '{}' (aspect: {})", query, plan.aspect);
    tracing::debug!("[Workflow] Query rationale: {}", plan.rationale);
    Ok(StatePatch::query(query))
}

/// Search with the query already in state and record one round.
pub async fn web_research(
    c: &Collaborators,
    state: &ResearchState,
) -> Result<StatePatch, PipelineError> {
    if state.search_query.trim().is_empty() {
        return Err(PipelineError::Validation(
            "web research needs a search query in state".to_string(),
        ));
    }
    let request = c.search_config.request_for(&state.search_query)?;
    let response = c.search.search(&request).await?;

    let sources: Vec<Source> = response
        .results
        .iter()
        .filter_map(|r| {
            let url = r.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
            Some(Source {
                url: url.to_string(),
                title: r.title.clone(),
                score: r.score,
                published_date: r.published_date.clone(),
                content: r.content.clone(),
            })
        })
        .collect();
    if sources.len() < response.results.len() {
        tracing::warn!(
            "[Workflow] Skipped {} search results without a URL",
            response.results.len() - sources.len()
        );
    }

    tracing::info!(
        "[Workflow] Search round {} returned {} results",
        state.research_loop_count + 1,
        response.results.len()
    );

    Ok(StatePatch {
        web_research_results: vec![format_results(&response)],
        sources_gathered: sources,
        completed_search_round: true,
        ..Default::default()
    })
}

pub async fn summarize(
    c: &Collaborators,
    state: &ResearchState,
) -> Result<StatePatch, PipelineError> {
    let research = state.latest_research().ok_or_else(|| {
        PipelineError::Validation("nothing to summarize: no search results yet".to_string())
    })?;
    let user = prompts::summarizer_user(&state.topic, research, state.running_summary.as_deref());
    let summary = llm::invoke_text(c.model.as_ref(), prompts::SUMMARIZER, &user).await?;

    let summary = summary.trim();
    if summary.is_empty() {
        return Err(PipelineError::malformed("summary", "model returned an empty summary"));
    }
    Ok(StatePatch::summary(summary))
}

#[derive(Debug, Deserialize)]
struct Reflection {
    #[serde(default)]
    knowledge_gap: String,
    follow_up_query: String,
}

pub async fn reflect(c: &Collaborators, state: &ResearchState) -> Result<StatePatch, PipelineError> {
    let summary = state.running_summary.as_deref().ok_or_else(|| {
        PipelineError::Validation("nothing to reflect on: summary is empty".to_string())
    })?;
    let reflection: Reflection = llm::invoke_structured(
        c.model.as_ref(),
        &prompts::reflection(&state.topic),
        &prompts::reflection_user(summary),
        OutputSchema::Reflection,
    )
    .await?;

    let query = reflection.follow_up_query.trim();
    if query.is_empty() {
        return Err(PipelineError::malformed(
            OutputSchema::Reflection.name(),
            "follow_up_query is empty",
        ));
    }
    tracing::info!("[Workflow] Knowledge gap: {}", reflection.knowledge_gap);
    Ok(StatePatch::query(query))
}

pub fn finalize(state: &ResearchState) -> Result<StatePatch, PipelineError> {
    let draft = state
        .draft_summary
        .as_deref()
        .or(state.running_summary.as_deref())
        .ok_or_else(|| {
            PipelineError::Validation("nothing to finalize: summary is empty".to_string())
        })?;
    Ok(StatePatch {
        running_summary: Some(finalize_summary(draft, &state.sources_gathered)),
        draft_summary: Some(draft.to_string()),
        ..Default::default()
    })
}

/// Wrap the summary with a header and a bulleted, URL-deduplicated source list.
///
/// The text is taken as is; markers the summarizer may have written itself
/// are not interpreted.
pub fn finalize_summary(summary: &str, sources: &[Source]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut bullets = Vec::new();
    for source in sources {
        if seen.contains(&source.url.as_str()) {
            continue;
        }
        seen.push(&source.url);
        match source.title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => bullets.push(format!("* {} : {}", title, source.url)),
            None => bullets.push(format!("* {}", source.url)),
        }
    }

    format!("{}{}{}{}", SUMMARY_HEADER, summary, SOURCES_MARKER, bullets.join("\n"))
}

/// Suspend without a decision; record it once one arrives.
pub fn human_approval(state: &ResearchState, decision: Option<ApprovalDecision>) -> StepOutcome {
    match decision {
        Some(decision) => {
            tracing::info!("[Workflow] Approval decision: {:?}", decision);
            StepOutcome::Patch(StatePatch::decision(decision))
        }
        None => StepOutcome::Suspend(ApprovalRequest::from_state(state)),
    }
}

#[derive(Debug, Deserialize)]
struct TweetBatch {
    tweets: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    content: String,
    virality_score: f64,
    #[serde(default)]
    justification: String,
}

#[derive(Debug, Deserialize)]
struct PostBatch {
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    headline: String,
    content: String,
    #[serde(default)]
    hashtags: Vec<String>,
    effectiveness_score: f64,
    #[serde(default)]
    strategic_value: String,
}

/// Generate every channel in `channels` and consume the pending decision.
pub async fn write_content(
    c: &Collaborators,
    state: &ResearchState,
    channels: &[ContentChannel],
) -> Result<StatePatch, PipelineError> {
    let summary = state
        .running_summary
        .as_deref()
        .filter(|_| state.is_finalized())
        .ok_or_else(|| {
            PipelineError::Validation(
                "cannot write content before the summary is finalized".to_string(),
            )
        })?;

    let mut patch = StatePatch {
        pending_decision: Some(None),
        ..Default::default()
    };
    for &channel in channels {
        let items = match channel {
            ContentChannel::ShortForm => short_form(c, &state.topic, summary).await?,
            ContentChannel::LongForm => long_form(c, &state.topic, summary).await?,
        };
        tracing::info!("[Workflow] Generated {} {} items", items.len(), channel);
        patch.generated_content.insert(channel, items);
    }
    Ok(patch)
}

async fn short_form(
    c: &Collaborators,
    topic: &str,
    summary: &str,
) -> Result<Vec<ContentItem>, PipelineError> {
    let schema = OutputSchema::ShortFormBatch;
    let batch: TweetBatch = llm::invoke_structured(
        c.model.as_ref(),
        prompts::SHORT_FORM_WRITER,
        &prompts::content_user("tweets", topic, summary),
        schema,
    )
    .await?;

    if batch.tweets.is_empty() {
        return Err(PipelineError::malformed(schema.name(), "no tweets returned"));
    }
    if batch.tweets.len() != EXPECTED_TWEETS {
        tracing::warn!(
            "[Workflow] Expected {} tweets, model returned {}",
            EXPECTED_TWEETS,
            batch.tweets.len()
        );
    }

    batch
        .tweets
        .into_iter()
        .map(|t| {
            check_score(schema, "virality_score", t.virality_score)?;
            Ok(ContentItem {
                body: t.content,
                score: t.virality_score,
                rationale: t.justification,
                headline: None,
                hashtags: Vec::new(),
            })
        })
        .collect()
}

async fn long_form(
    c: &Collaborators,
    topic: &str,
    summary: &str,
) -> Result<Vec<ContentItem>, PipelineError> {
    let schema = OutputSchema::LongFormBatch;
    let batch: PostBatch = llm::invoke_structured(
        c.model.as_ref(),
        prompts::LONG_FORM_WRITER,
        &prompts::content_user("LinkedIn posts", topic, summary),
        schema,
    )
    .await?;

    if batch.posts.is_empty() {
        return Err(PipelineError::malformed(schema.name(), "no posts returned"));
    }

    batch
        .posts
        .into_iter()
        .map(|p| {
            check_score(schema, "effectiveness_score", p.effectiveness_score)?;
            Ok(ContentItem {
                body: p.content,
                score: p.effectiveness_score,
                rationale: p.strategic_value,
                headline: Some(p.headline).filter(|h| !h.is_empty()),
                hashtags: p.hashtags,
            })
        })
        .collect()
}

fn check_score(schema: OutputSchema, field: &str, score: f64) -> Result<(), PipelineError> {
    if SCORE_RANGE.contains(&score) {
        Ok(())
    } else {
        Err(PipelineError::malformed(
            schema.name(),
            format!("{} {} is outside 1..=10", field, score),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelRequest, OutputFormat};
    use crate::search::{SearchRequest, SearchResponse, SearchResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel {
        reply: String,
        requests: Mutex<Vec<ModelRequest>>,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, request: &ModelRequest) -> Result<String, PipelineError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    struct CannedSearch;

    #[async_trait]
    impl SearchProvider for CannedSearch {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, PipelineError> {
            Ok(SearchResponse {
                query: request.query.clone(),
                answer: None,
                results: vec![
                    SearchResult {
                        title: Some("A".to_string()),
                        url: Some("https://a.example".to_string()),
                        ..Default::default()
                    },
                    SearchResult {
                        title: Some("No link".to_string()),
                        ..Default::default()
                    },
                ],
            })
        }
    }

    fn collaborators(reply: &str) -> (Collaborators, Arc<CannedModel>) {
        let model = Arc::new(CannedModel {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        });
        (Collaborators::new(model.clone(), Arc::new(CannedSearch)), model)
    }

    fn source(url: &str, title: Option<&str>) -> Source {
        Source {
            url: url.to_string(),
            title: title.map(String::from),
            score: None,
            published_date: None,
            content: None,
        }
    }

    #[test]
    fn test_finalize_dedups_by_url() {
        let sources = vec![
            source("https://a.example", Some("A")),
            source("https://b.example", None),
            source("https://a.example", Some("A again")),
        ];
        let text = finalize_summary("Body.", &sources);
        assert_eq!(
            text,
            "## Summary\n\nBody.\n\n### Sources:\n* A : https://a.example\n* https://b.example"
        );
    }

    fn finalized(draft: &str) -> ResearchState {
        let mut state = ResearchState::new("t");
        state.running_summary = Some(draft.to_string());
        let patch = finalize(&state).unwrap();
        state.merge(patch);
        state
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut state = ResearchState::new("t");
        state.running_summary = Some("Body.".to_string());
        state.sources_gathered = vec![
            source("https://a.example", Some("A")),
            source("https://a.example", Some("A")),
        ];
        state.merge(finalize(&state).unwrap());
        let once = state.running_summary.clone().unwrap();
        state.merge(finalize(&state).unwrap());
        assert_eq!(state.running_summary.as_deref(), Some(once.as_str()));
        assert_eq!(once.matches("https://a.example").count(), 1);
        assert_eq!(state.draft_summary.as_deref(), Some("Body."));
    }

    #[test]
    fn test_finalize_keeps_summary_that_looks_finalized() {
        let draft = "## Summary\n\nQuantum batteries charge fast.\n\n### Sources:\nKey caveat: decoherence limits scaling.";
        let state = finalized(draft);
        let text = state.running_summary.unwrap();
        assert!(text.contains("Key caveat: decoherence limits scaling."));
        assert!(text.contains(draft));

        let mut again = ResearchState::new("t");
        again.running_summary = Some(text.clone());
        again.draft_summary = state.draft_summary;
        assert_eq!(finalize(&again).unwrap().running_summary, Some(text));
    }

    #[test]
    fn test_human_approval_suspends_without_decision() {
        let mut state = ResearchState::new("quantum batteries");
        state.running_summary = Some("## Summary\n\nS".to_string());
        match human_approval(&state, None) {
            StepOutcome::Suspend(req) => {
                assert_eq!(req.topic, "quantum batteries");
                assert_eq!(req.summary, "## Summary\n\nS");
            }
            other => panic!("expected suspension, got {other:?}"),
        }
        assert_eq!(
            human_approval(&state, Some(ApprovalDecision::LongForm)),
            StepOutcome::Patch(StatePatch::decision(ApprovalDecision::LongForm))
        );
    }

    #[tokio::test]
    async fn test_web_research_uses_state_query_and_skips_urlless_sources() {
        let (c, model) = collaborators("{}");
        let mut state = ResearchState::new("t");
        state.search_query = "solid state batteries".to_string();

        let patch = web_research(&c, &state).await.unwrap();
        assert!(model.requests.lock().unwrap().is_empty());
        assert!(patch.completed_search_round);
        assert_eq!(patch.sources_gathered.len(), 1);
        assert!(patch.web_research_results[0].contains("2. No link"));
        assert!(patch.web_research_results[0].starts_with("Query: solid state batteries"));
    }

    #[tokio::test]
    async fn test_web_research_rejects_empty_query() {
        let (c, _) = collaborators("{}");
        assert!(matches!(
            web_research(&c, &ResearchState::new("t")).await,
            Err(PipelineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_query_requests_json() {
        let (c, model) = collaborators(r#"{"query": " qb charging ", "aspect": "a", "rationale": "r"}"#);
        let patch = generate_query(&c, &ResearchState::new("quantum batteries")).await.unwrap();
        assert_eq!(patch.search_query.as_deref(), Some("qb charging"));
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].format, OutputFormat::Json(OutputSchema::Query));
        assert!(requests[0].system.contains("quantum batteries"));
    }

    #[tokio::test]
    async fn test_content_rejects_out_of_range_score() {
        let (c, _) = collaborators(r#"{"tweets": [{"content": "x", "virality_score": 11, "justification": "j"}]}"#);
        let state = finalized("S");
        assert!(matches!(
            write_content(&c, &state, &[ContentChannel::ShortForm]).await,
            Err(PipelineError::MalformedModelOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_content_requires_finalized_summary() {
        let (c, model) = collaborators("{}");
        let mut state = ResearchState::new("t");
        state.running_summary = Some("## Summary\n\ndraft\n\n### Sources:\n".to_string());
        assert!(matches!(
            write_content(&c, &state, &[ContentChannel::LongForm]).await,
            Err(PipelineError::Validation(_))
        ));
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_long_form_items() {
        let (c, _) = collaborators(
            r#"{"posts": [{"headline": "H", "content": "C", "hashtags": ["A"], "effectiveness_score": 9, "strategic_value": "V"}]}"#,
        );
        let mut state = finalized("S");
        state.pending_decision = Some(ApprovalDecision::LongForm);
        let patch = write_content(&c, &state, &[ContentChannel::LongForm]).await.unwrap();
        assert_eq!(patch.pending_decision, Some(None));
        let items = &patch.generated_content[&ContentChannel::LongForm];
        assert_eq!(items[0].headline.as_deref(), Some("H"));
        assert_eq!(items[0].score, 9.0);
        assert_eq!(items[0].rationale, "V");
    }
}
