//! `topicast research`: start, resume, retry and inspect sessions.

use console::style;
use tokio_stream::StreamExt;

use topicast_core::models::{ApprovalRequest, ContentChannel, ResearchState, RunStatus};
use topicast_core::state::AppState;
use topicast_core::workflow::{NodeId, SnapshotStream};
use topicast_core::{FailureReport, Snapshot, WorkflowEngine};

use super::{print_json, truncate};

pub async fn start(
    state: &AppState,
    topic: &str,
    session_id: Option<&str>,
    decision: Option<&str>,
    interactive: bool,
) -> Result<(), String> {
    let engine = state.engine_from_config().map_err(|e| e.to_string())?;
    let session_id = session_id
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("🔎 Researching '{}'", topic);
    println!("   Session: {}", session_id);
    println!();

    let stream = engine
        .start(topic, &session_id)
        .await
        .map_err(|e| e.to_string())?;
    let last = render(stream).await?;

    let Some(RunStatus::Suspended { prompt }) = last.map(|s| s.status) else {
        return Ok(());
    };

    let decision = match decision {
        Some(d) => d.to_string(),
        None if interactive => ask_decision(&prompt)?,
        None => {
            print_approval(&prompt);
            println!();
            println!("Continue with:");
            println!(
                "  topicast research resume --session-id {} --decision <t|l|b>",
                session_id
            );
            return Ok(());
        }
    };

    continue_with(&engine, &session_id, &decision).await
}

pub async fn resume(state: &AppState, session_id: &str, decision: &str) -> Result<(), String> {
    let engine = state.engine_from_config().map_err(|e| e.to_string())?;
    continue_with(&engine, session_id, decision).await
}

async fn continue_with(engine: &WorkflowEngine, session_id: &str, decision: &str) -> Result<(), String> {
    println!("▶️  Resuming {} with decision '{}'", session_id, decision);
    let stream = engine
        .resume(session_id, decision)
        .await
        .map_err(|e| e.to_string())?;
    if let Some(done) = render(stream).await? {
        print_content(&done.state);
    }
    Ok(())
}

pub async fn retry(state: &AppState, session_id: &str) -> Result<(), String> {
    let engine = state.engine_from_config().map_err(|e| e.to_string())?;
    println!("🔁 Retrying {}", session_id);
    let stream = engine.retry(session_id).await.map_err(|e| e.to_string())?;
    if let Some(last) = render(stream).await? {
        match last.status {
            RunStatus::Suspended { prompt } => {
                print_approval(&prompt);
                println!();
                println!(
                    "Continue with: topicast research resume --session-id {} --decision <t|l|b>",
                    session_id
                );
            }
            RunStatus::Completed => print_content(&last.state),
            _ => {}
        }
    }
    Ok(())
}

pub async fn show(state: &AppState, session_id: &str, json: bool) -> Result<(), String> {
    let checkpoint = state
        .checkpoint_store
        .get(session_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Session '{}' not found", session_id))?;

    if json {
        let value = serde_json::to_value(&checkpoint).map_err(|e| e.to_string())?;
        print_json(&value);
        return Ok(());
    }

    let s = &checkpoint.state;
    println!("Session : {}", checkpoint.session_id);
    println!("Topic   : {}", s.topic);
    println!("Status  : {}", status_label(&checkpoint.status));
    println!("Next    : {}", checkpoint.next_node);
    println!("Rounds  : {}", s.research_loop_count);
    println!("Sources : {}", s.sources_gathered.len());
    if let RunStatus::Failed { error } = &checkpoint.status {
        println!("Error   : {}", style(error).red());
    }
    if let Some(summary) = &s.running_summary {
        println!();
        println!("{}", summary);
    }
    print_content(s);

    let publications = state
        .publication_store
        .list_for_session(session_id)
        .await
        .map_err(|e| e.to_string())?;
    if !publications.is_empty() {
        println!();
        println!("Published:");
        for p in publications {
            println!(
                "  {} #{} → {} {} {}",
                p.channel,
                p.item_index,
                p.platform,
                p.post_id,
                p.url.unwrap_or_default()
            );
        }
    }
    Ok(())
}

pub async fn list(state: &AppState, limit: usize) -> Result<(), String> {
    let sessions = state
        .checkpoint_store
        .list(Some(limit))
        .await
        .map_err(|e| e.to_string())?;

    if sessions.is_empty() {
        println!("No sessions yet. Start one with: topicast research start --topic \"...\"");
        return Ok(());
    }

    println!("┌──────────────────────────────────────┬────────────────────────┬───────────┬────────────────┐");
    println!("│ Session                              │ Topic                  │ Status    │ Next           │");
    println!("├──────────────────────────────────────┼────────────────────────┼───────────┼────────────────┤");
    for s in sessions {
        println!(
            "│ {:<36} │ {:<22} │ {:<9} │ {:<14} │",
            truncate(&s.session_id, 36),
            truncate(&s.topic, 22),
            s.status,
            s.next_node
        );
    }
    println!("└──────────────────────────────────────┴────────────────────────┴───────────┴────────────────┘");
    Ok(())
}

/// Print one line per completed node; returns the last snapshot.
async fn render(mut stream: SnapshotStream<'_>) -> Result<Option<Snapshot>, String> {
    let mut last = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(snapshot) => {
                println!("   {} {:<15} {}", style("✓").green(), snapshot.node, detail(&snapshot));
                last = Some(snapshot);
            }
            Err(failure) => {
                let report = FailureReport::from(&failure);
                println!("   {} {:<15} {}", style("✗").red(), report.node, report.message);
                return Err(format!(
                    "{} failed at '{}' ({}). Fix the cause and run: topicast research retry --session-id {}",
                    report.session_id, report.node, report.kind, report.session_id
                ));
            }
        }
    }
    Ok(last)
}

fn detail(snapshot: &Snapshot) -> String {
    let s = &snapshot.state;
    match snapshot.node {
        NodeId::GenerateQuery | NodeId::Reflect => format!("query: {}", truncate(&s.search_query, 70)),
        NodeId::WebResearch => format!(
            "round {}, {} sources so far",
            s.research_loop_count,
            s.sources_gathered.len()
        ),
        NodeId::Summarize | NodeId::Finalize => format!(
            "summary: {} chars",
            s.running_summary.as_deref().map_or(0, |t| t.chars().count())
        ),
        NodeId::HumanApproval => match &snapshot.status {
            RunStatus::Suspended { .. } => "waiting for a decision".to_string(),
            _ => format!("decision: {:?}", s.pending_decision),
        },
        NodeId::ShortForm | NodeId::LongForm | NodeId::Both => format!(
            "{} short-form, {} long-form",
            s.content(ContentChannel::ShortForm).len(),
            s.content(ContentChannel::LongForm).len()
        ),
        NodeId::End => String::new(),
    }
}

fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Running => style("running").yellow().to_string(),
        RunStatus::Suspended { .. } => style("awaiting approval").cyan().to_string(),
        RunStatus::Completed => style("completed").green().to_string(),
        RunStatus::Failed { .. } => style("failed").red().to_string(),
    }
}

fn print_approval(prompt: &ApprovalRequest) {
    println!();
    println!("═══════════════════════════════════════════════════════════");
    println!("  Approval needed: {}", prompt.topic);
    println!("═══════════════════════════════════════════════════════════");
    println!("{}", prompt.summary);
}

const CHOICES: [(&str, &str); 3] = [
    ("t", "Short-form posts (X)"),
    ("l", "Long-form posts (LinkedIn)"),
    ("b", "Both"),
];

fn ask_decision(prompt: &ApprovalRequest) -> Result<String, String> {
    print_approval(prompt);
    println!();
    let labels: Vec<&str> = CHOICES.iter().map(|(_, label)| *label).collect();
    let picked = dialoguer::Select::new()
        .with_prompt("What should be written?")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| format!("Failed to read decision: {}", e))?;
    Ok(CHOICES[picked].0.to_string())
}

fn print_content(state: &ResearchState) {
    for (channel, items) in &state.generated_content {
        println!();
        println!("── {} ({}) ──", channel, items.len());
        for (i, item) in items.iter().enumerate() {
            match &item.headline {
                Some(headline) => println!("[{}] ({}/10) {}", i, item.score, style(headline).bold()),
                None => println!("[{}] ({}/10) {}", i, item.score, item.body),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicast_core::models::ContentItem;

    fn snapshot(node: NodeId, state: ResearchState) -> Snapshot {
        Snapshot {
            session_id: "s".to_string(),
            node,
            status: RunStatus::Running,
            state,
        }
    }

    #[test]
    fn test_detail_lines() {
        let mut state = ResearchState::new("t");
        state.search_query = "quantum battery charging".to_string();
        assert_eq!(
            detail(&snapshot(NodeId::GenerateQuery, state.clone())),
            "query: quantum battery charging"
        );

        state.generated_content.insert(
            ContentChannel::ShortForm,
            vec![ContentItem {
                body: "b".to_string(),
                score: 5.0,
                rationale: String::new(),
                headline: None,
                hashtags: vec![],
            }],
        );
        assert_eq!(
            detail(&snapshot(NodeId::Both, state)),
            "1 short-form, 0 long-form"
        );
    }

    #[test]
    fn test_choices_cover_all_decisions() {
        let keys: Vec<&str> = CHOICES.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["t", "l", "b"]);
    }
}
