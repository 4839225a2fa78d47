use super::CommandContext;

/// Handle the cache list command
pub async fn handle_cache_list(
    context: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let weeks = context.engine.store().cached_weeks(context.user).await;

    if weeks.is_empty() {
        println!("No cached weeks for '{}'", context.user);
        return Ok(());
    }

    for (iso_year, iso_week, plays) in &weeks {
        println!("{iso_year}-W{iso_week:02}  {plays:>5} plays");
    }
    println!();
    println!(
        "{} cached week{} for '{}'",
        weeks.len(),
        if weeks.len() == 1 { "" } else { "s" },
        context.user
    );

    Ok(())
}

/// Handle the cache clear command
pub async fn handle_cache_clear(
    context: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cached = context.engine.store().len().await;
    context.engine.clear_cache().await?;
    println!("🗑️  Cache cleared ({cached} cached weeks removed)");
    Ok(())
}
