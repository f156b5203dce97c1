//! Topicast CLI: research a topic, approve the summary, write and publish posts.
//!
//! Thin shell over topicast-core; every command opens the SQLite checkpoint
//! store and drives the same `WorkflowEngine`.

mod commands;

use clap::{Parser, Subcommand};

/// Topicast: topic research pipeline with a human approval gate
#[derive(Parser)]
#[command(name = "topicast", version, about = "Topicast: research a topic, approve, publish")]
pub struct Cli {
    /// Path to the SQLite database file (default: platform data dir)
    #[arg(long, env = "TOPICAST_DB_PATH")]
    db: Option<String>,

    /// Path to the YAML configuration file (defaults apply when missing)
    #[arg(long, env = "TOPICAST_CONFIG", default_value = "topicast.yaml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and inspect research sessions
    Research {
        #[command(subcommand)]
        action: ResearchAction,
    },

    /// Publish one generated item of a completed session
    Publish {
        /// Session ID
        #[arg(long)]
        session_id: String,
        /// Content channel: short_form or long_form
        #[arg(long)]
        channel: String,
        /// Zero-based index of the item within the channel
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Target platform: x or linkedin
        #[arg(long)]
        platform: String,
        /// LinkedIn audience: public or connections
        #[arg(long, default_value = "public")]
        visibility: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ResearchAction {
    /// Start a new session and run until the approval gate
    Start {
        /// Topic to research
        #[arg(long)]
        topic: String,
        /// Session ID (generated when omitted)
        #[arg(long)]
        session_id: Option<String>,
        /// Decision to apply at the approval gate: t (short-form), l (long-form), anything else (both)
        #[arg(long, conflicts_with = "interactive")]
        decision: Option<String>,
        /// Ask for the decision at the approval gate
        #[arg(long, short = 'i')]
        interactive: bool,
    },
    /// Continue a suspended session with a decision
    Resume {
        #[arg(long)]
        session_id: String,
        /// t (short-form), l (long-form), anything else (both)
        #[arg(long)]
        decision: String,
    },
    /// Re-run a failed or interrupted session from the step that did not complete
    Retry {
        #[arg(long)]
        session_id: String,
    },
    /// Show a session's status, summary and generated content
    Show {
        #[arg(long)]
        session_id: String,
        /// Print the raw checkpoint as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent sessions
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets masked
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicast_core=warn,topicast_cli=info".into()),
        )
        .init();

    let result = if let Some(command) = cli.command {
        let state = commands::init_state(cli.db.as_deref(), &cli.config).await;
        match command {
            Commands::Research { action } => match action {
                ResearchAction::Start {
                    topic,
                    session_id,
                    decision,
                    interactive,
                } => {
                    commands::research::start(
                        &state,
                        &topic,
                        session_id.as_deref(),
                        decision.as_deref(),
                        interactive,
                    )
                    .await
                }
                ResearchAction::Resume {
                    session_id,
                    decision,
                } => commands::research::resume(&state, &session_id, &decision).await,
                ResearchAction::Retry { session_id } => {
                    commands::research::retry(&state, &session_id).await
                }
                ResearchAction::Show { session_id, json } => {
                    commands::research::show(&state, &session_id, json).await
                }
                ResearchAction::List { limit } => commands::research::list(&state, limit).await,
            },

            Commands::Publish {
                session_id,
                channel,
                index,
                platform,
                visibility,
            } => {
                commands::publish::run(&state, &session_id, &channel, index, &platform, &visibility)
                    .await
            }

            Commands::Config { action } => match action {
                ConfigAction::Show => commands::config::show(&state),
            },
        }
    } else {
        // No subcommand: show help
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
