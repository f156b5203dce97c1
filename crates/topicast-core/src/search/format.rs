//! Render search responses as plain text for the summarizer prompt.

use std::fmt::Write;

use crate::error::PipelineError;
use crate::search::SearchResponse;

/// Numbered listing of results with title, URL, score, date and content.
///
/// Pure and deterministic; missing fields render as `No title`, `No URL`,
/// `N/A` and `No content`.
pub fn format_results(response: &SearchResponse) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Query: {}", response.query);
    if let Some(answer) = response.answer.as_deref().filter(|a| !a.is_empty()) {
        out.push_str("Generated Answer:\n");
        let _ = writeln!(out, "{}", answer);
        let _ = writeln!(out, "\n{}", "=".repeat(50));
    }

    out.push_str("Search Results:\n");
    for (idx, res) in response.results.iter().enumerate() {
        let _ = writeln!(out, "\n{}. {}", idx + 1, res.title.as_deref().unwrap_or("No title"));
        let _ = writeln!(out, "   URL: {}", res.url.as_deref().unwrap_or("No URL"));
        match res.score {
            Some(score) => {
                let _ = writeln!(out, "   Relevance Score: {}", score);
            }
            None => out.push_str("   Relevance Score: N/A\n"),
        }
        if let Some(date) = &res.published_date {
            let _ = writeln!(out, "   Published Date: {}", date);
        }
        let _ = writeln!(
            out,
            "\n   Content: {}",
            res.content.as_deref().unwrap_or("No content")
        );
    }

    out
}

/// Format an untyped provider payload; anything but a JSON object is rejected.
pub fn format_value(value: &serde_json::Value) -> Result<String, PipelineError> {
    if !value.is_object() {
        return Err(PipelineError::Validation(format!(
            "search results must be a JSON object, got {}",
            json_type(value)
        )));
    }
    let response: SearchResponse = serde_json::from_value(value.clone())
        .map_err(|e| PipelineError::Validation(format!("invalid search results: {}", e)))?;
    Ok(format_results(&response))
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
