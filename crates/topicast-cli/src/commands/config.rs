//! `topicast config`: inspect the effective configuration.

use topicast_core::config::is_unresolved;
use topicast_core::state::AppState;

pub fn show(state: &AppState) -> Result<(), String> {
    let config = &state.config;
    let yaml = serde_yaml::to_string(&config.redacted())
        .map_err(|e| format!("Failed to render config: {}", e))?;
    println!("{}", yaml);

    let mut missing = Vec::new();
    if is_unresolved(&config.model.api_key) {
        missing.push("model.api_key");
    }
    if is_unresolved(&config.search.api_key) {
        missing.push("search.api_key");
    }
    if !missing.is_empty() {
        println!("⚠️  Unresolved settings: {}", missing.join(", "));
        println!("   Set the referenced environment variables or add them to .env");
    }
    Ok(())
}
