use super::utils::fit;
use lastfm_charts::{Chart, ChartEntry, Granularity, Period};
use serde::Serialize;

/// Events emitted by chart commands (JSON output to stdout)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ChartOutputEvent<'a> {
    /// A chart is about to be listed
    ChartStarted { user: &'a str, period: &'a Period },
    /// One ranked entry
    EntryFound { entry: &'a ChartEntry },
    /// All entries have been listed
    ChartFinished { total_entries: usize },
}

/// Output a chart event as JSON to stdout
pub fn output_event(event: &ChartOutputEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    } else {
        log::error!("Failed to serialize event to JSON");
    }
}

fn title(chart: &Chart) -> &'static str {
    match chart.period.granularity() {
        Granularity::Week => "Weekly chart",
        Granularity::Month => "Monthly chart",
        Granularity::Year => "Yearly chart",
    }
}

/// Print a chart as a table
pub fn print_chart(user: &str, chart: &Chart) {
    println!(
        "📊 {} {} for {user} (top {})",
        title(chart),
        chart.period,
        chart.period.granularity().chart_limit()
    );
    println!();

    if chart.is_empty() {
        println!("No scrobbles in this period.");
        return;
    }

    println!(
        "{:>3}  {:<32} {:<24} {:<24} {:>5} {:>6}",
        "#", "Title", "Artist", "Album", "Plays", "Points"
    );
    for entry in &chart.entries {
        println!(
            "{:>3}  {:<32} {:<24} {:<24} {:>5} {:>6}",
            entry.rank,
            fit(&entry.track_title, 32),
            fit(&entry.artist, 24),
            fit(&entry.album, 24),
            entry.play_count,
            entry.points
        );
    }
}
