//! `topicast publish`: push one generated item to X or LinkedIn.

use topicast_core::models::ContentChannel;
use topicast_core::publish::{Platform, PublishOptions, Visibility};
use topicast_core::state::AppState;

pub async fn run(
    state: &AppState,
    session_id: &str,
    channel: &str,
    index: usize,
    platform: &str,
    visibility: &str,
) -> Result<(), String> {
    let channel = ContentChannel::parse(channel)
        .ok_or_else(|| format!("Unknown channel '{}' (expected short_form or long_form)", channel))?;
    let platform = Platform::parse(platform)
        .ok_or_else(|| format!("Unknown platform '{}' (expected x or linkedin)", platform))?;
    let options = PublishOptions {
        visibility: parse_visibility(visibility)?,
    };

    let publisher = state.publisher(platform).map_err(|e| e.to_string())?;
    let publication = state
        .publish(publisher.as_ref(), session_id, channel, index, &options)
        .await
        .map_err(|e| e.to_string())?;

    println!("✅ Published {} #{} to {}", channel, index, platform);
    println!("   Post ID: {}", publication.post_id);
    if let Some(url) = &publication.url {
        println!("   URL    : {}", url);
    }
    Ok(())
}

fn parse_visibility(s: &str) -> Result<Visibility, String> {
    match s.to_lowercase().as_str() {
        "public" => Ok(Visibility::Public),
        "connections" => Ok(Visibility::Connections),
        other => Err(format!(
            "Unknown visibility '{}' (expected public or connections)",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_visibility() {
        assert_eq!(parse_visibility("PUBLIC").unwrap(), Visibility::Public);
        assert_eq!(parse_visibility("connections").unwrap(), Visibility::Connections);
        assert!(parse_visibility("friends").is_err());
    }
}
