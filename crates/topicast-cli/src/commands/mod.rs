//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the topicast-core domain logic through `AppState`.

pub mod config;
pub mod publish;
pub mod research;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use topicast_core::state::AppState;
use topicast_core::PipelineConfig;

/// Open the database, load `.env` files and the configuration.
pub async fn init_state(db_path: Option<&str>, config_path: &str) -> AppState {
    load_dotenv();

    let db_path = db_path
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    let db = topicast_core::Database::open(&db_path.to_string_lossy()).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", db_path.display(), e);
        std::process::exit(1);
    });

    let config = PipelineConfig::load_or_default(Path::new(config_path))
        .map(PipelineConfig::resolve_env)
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        });

    Arc::new(topicast_core::AppStateInner::new(db, config))
}

/// `<data dir>/topicast/topicast.db`, or `./topicast.db` when there is no data dir.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("topicast").join("topicast.db"))
        .unwrap_or_else(|| PathBuf::from("topicast.db"))
}

/// Load .env and .env.local files for environment variables.
pub fn load_dotenv() {
    // .env.local first (higher priority), then .env
    for filename in &[".env.local", ".env"] {
        let path = Path::new(filename);
        if !path.exists() {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(path) {
            for (key, value) in parse_dotenv(&content) {
                // Existing env vars take priority
                if std::env::var(&key).is_err() {
                    std::env::set_var(&key, &value);
                }
            }
            tracing::info!("[Config] Loaded environment from '{}'", filename);
        }
    }
}

/// `KEY=VALUE` pairs; comments, blank lines and `export ` prefixes are handled.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# keys\nGROQ_API_KEY=gsk_123\n\nexport TAVILY_API_KEY=\"tvly 456\"\nBROKEN\nX='y'\n=orphan\n",
        );
        assert_eq!(
            vars,
            vec![
                ("GROQ_API_KEY".to_string(), "gsk_123".to_string()),
                ("TAVILY_API_KEY".to_string(), "tvly 456".to_string()),
                ("X".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("quantum batteries", 8), "quantum…");
        assert_eq!(truncate("⚡⚡⚡⚡", 3), "⚡⚡…");
    }

    #[test]
    fn test_default_db_path_file_name() {
        assert_eq!(default_db_path().file_name().unwrap(), "topicast.db");
    }
}
