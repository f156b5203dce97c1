//! System instructions and user messages for each model call.

pub fn query_writer(topic: &str) -> String {
    format!(
        r#"You write a single, targeted web search query for research on a topic.

Topic:
{topic}

Reply with a JSON object and nothing else:
{{
    "query": "the search query",
    "aspect": "which aspect of the topic the query covers",
    "rationale": "why this query is useful"
}}"#
    )
}

pub const QUERY_WRITER_USER: &str = "Write the web search query.";

pub const SUMMARIZER: &str = r#"You write a factual summary of web search results.

If an existing summary is given, extend it:
- add only information that is new and not already covered
- keep the existing tone and level of detail
- blend new material in without announcing it

If no summary exists yet, write a new one:
- pull out the most relevant points from each source
- give a concise overview of the key findings
- keep the text flowing as a single piece

Rules:
- start directly with the summary text, no preamble or commentary about the task
- never describe your process ("I will", "let me", "based on the new results")
- stay objective and avoid repetition
- do not add a references or sources section"#;

pub fn summarizer_user(topic: &str, research: &str, existing: Option<&str>) -> String {
    match existing {
        Some(summary) if !summary.trim().is_empty() => format!(
            "Extend the existing summary: {summary}\n\n\
             Include new search results: {research} \
             That addresses the following topic: {topic}"
        ),
        _ => format!(
            "Generate a summary of these search results: {research} \
             That addresses the following topic: {topic}"
        ),
    }
}

pub fn reflection(topic: &str) -> String {
    format!(
        r#"You are a research analyst reviewing a summary about {topic}.

1. Find the most important knowledge gap in the summary.
2. Write one follow-up web search query that would close it.
3. Prefer technical details, implementation specifics and emerging developments the summary does not cover.

The query must stand on its own as a web search, with all the context it needs.

Reply with a JSON object and nothing else:
{{
    "knowledge_gap": "what is missing",
    "follow_up_query": "the follow-up search query"
}}"#
    )
}

pub fn reflection_user(summary: &str) -> String {
    format!(
        "Identify a knowledge gap and write a follow-up web search query based on what we know so far: {summary}"
    )
}

pub const SHORT_FORM_WRITER: &str = r#"You write short-form posts for X (Twitter).

Write exactly 10 distinct tweets about the topic, grounded in the researched content.

- each tweet must fit in 280 characters
- vary the hook: a question, a surprising fact, a bold claim, a call to action
- match the tone to the topic; hashtags and emoji only when they help
- do not repeat phrasing between tweets

Score every tweet's likely virality from 1 to 10 (engagement potential, relevance, emotional impact) and justify the score in one sentence.

Reply with a JSON object and nothing else:
{
    "tweets": [
        {"content": "tweet text", "virality_score": 7, "justification": "why"}
    ]
}"#;

pub const LONG_FORM_WRITER: &str = r#"You write long-form LinkedIn posts for a professional audience.

Write 5 or 6 distinct posts about the topic, grounded in the researched content.

- each post runs 400 to 700 words with a strong opening line
- short paragraphs, line breaks and lists where they aid reading
- mix formats: industry insight, case study, explainer, data-driven analysis
- professional but conversational; at most 3 emoji and 3 to 5 hashtags
- close with a question or a clear, low-pressure call to action

Score every post's effectiveness from 1 to 10 (professional value, engagement potential, audience relevance, strategic impact) and explain its strategic value in one sentence.

Reply with a JSON object and nothing else:
{
    "posts": [
        {
            "headline": "opening line",
            "content": "full post text",
            "hashtags": ["Tag1", "Tag2"],
            "effectiveness_score": 8,
            "strategic_value": "why"
        }
    ]
}"#;

pub fn content_user(kind: &str, topic: &str, summary: &str) -> String {
    format!("Write {kind} for the topic: {topic}\n\nResearched content:\n{summary}")
}
