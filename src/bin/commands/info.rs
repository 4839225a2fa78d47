use super::utils::{format_count, format_duration};
use super::CommandContext;

/// Handle the info command
pub async fn handle_info(
    context: &CommandContext<'_>,
    artist: &str,
    track: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Looking up '{track}' by '{artist}'");

    let info = context.client.track_info(artist, track).await?;

    println!("🎵 {} - {}", info.artist, info.name);
    println!(
        "   Album:     {}",
        info.album.as_deref().unwrap_or("N/A")
    );
    println!(
        "   Duration:  {}",
        info.duration_ms
            .map(format_duration)
            .unwrap_or_else(|| "N/A".to_string())
    );
    println!(
        "   Listeners: {}",
        info.listeners
            .map(format_count)
            .unwrap_or_else(|| "N/A".to_string())
    );
    println!(
        "   Plays:     {}",
        info.playcount
            .map(format_count)
            .unwrap_or_else(|| "N/A".to_string())
    );
    println!(
        "   Tags:      {}",
        if info.tags.is_empty() {
            "none".to_string()
        } else {
            info.tags.join(", ")
        }
    );

    Ok(())
}
