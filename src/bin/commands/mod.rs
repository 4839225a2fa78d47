pub mod cache;
pub mod chart;
pub mod chart_output;
pub mod info;
pub mod utils;

use clap::{Args, Subcommand};
use lastfm_charts::{ChartEngine, LastFmApiClient};

/// Everything a command needs to run.
pub struct CommandContext<'a> {
    pub engine: &'a ChartEngine,
    pub client: &'a LastFmApiClient,
    pub user: &'a str,
}

/// Options shared by the chart commands.
#[derive(Args, Clone, Debug)]
pub struct ChartArgs {
    /// Move this many periods back (negative) or forward from the selected one
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i32,

    /// Print JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List the weeks cached for the user
    List,

    /// Delete every cached week, for all users
    ///
    /// The next chart request fetches its weeks from Last.fm again.
    Clear,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the top 20 tracks of an ISO week
    ///
    /// Without --year/--week the week of your most recent scrobble is used.
    ///
    /// Usage examples:
    /// # Week 3 of 2024
    /// lastfm-charts week --year 2024 --week 3
    ///
    /// # The week before your latest scrobble
    /// lastfm-charts week --offset -1
    Week {
        /// ISO year
        #[arg(long)]
        year: Option<i32>,

        /// ISO week (1-53)
        #[arg(long)]
        week: Option<u32>,

        #[command(flatten)]
        args: ChartArgs,
    },

    /// Show the top 30 tracks of a month
    ///
    /// Monthly charts add up the points of the weekly charts in the month.
    ///
    /// Usage examples:
    /// # January 2024
    /// lastfm-charts month --year 2024 --month 1
    ///
    /// # Same month, as JSON lines
    /// lastfm-charts month --year 2024 --month 1 --json
    Month {
        /// Calendar year
        #[arg(long)]
        year: Option<i32>,

        /// Month (1-12)
        #[arg(long)]
        month: Option<u32>,

        #[command(flatten)]
        args: ChartArgs,
    },

    /// Show the top 50 tracks of a year
    ///
    /// Yearly charts add up the points of the monthly charts in the year.
    Year {
        /// Calendar year
        #[arg(long)]
        year: Option<i32>,

        #[command(flatten)]
        args: ChartArgs,
    },

    /// Show global Last.fm statistics for a track
    Info {
        /// Artist name
        #[arg(long)]
        artist: String,

        /// Track title
        #[arg(long)]
        track: String,
    },

    /// Inspect or clear the scrobble cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

pub async fn execute_command(
    command: Commands,
    context: &CommandContext<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Week { year, week, args } => {
            chart::handle_chart(context, chart::PeriodRequest::Week { year, week }, &args).await
        }
        Commands::Month { year, month, args } => {
            chart::handle_chart(context, chart::PeriodRequest::Month { year, month }, &args).await
        }
        Commands::Year { year, args } => {
            chart::handle_chart(context, chart::PeriodRequest::Year { year }, &args).await
        }
        Commands::Info { artist, track } => info::handle_info(context, &artist, &track).await,
        Commands::Cache(CacheCommands::List) => cache::handle_cache_list(context).await,
        Commands::Cache(CacheCommands::Clear) => cache::handle_cache_clear(context).await,
    }
}
