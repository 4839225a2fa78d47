mod commands;

use clap::Parser;
use commands::{execute_command, CommandContext, Commands};
use lastfm_charts::{BucketStore, ChartEngine, ChartsConfig, LastFmApiClient};
use std::path::PathBuf;

/// Weekly, monthly and yearly Last.fm track charts
#[derive(Parser)]
#[command(
    name = "lastfm-charts",
    about = "Weekly, monthly and yearly Last.fm track charts",
    long_about = None
)]
struct Cli {
    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    /// Last.fm user to chart (defaults to the first configured user)
    #[arg(long, short, global = true)]
    user: Option<String>,

    /// Config file (defaults to $LASTFM_CHARTS_CONFIG or ~/.config/lastfm-charts/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match ChartsConfig::discover(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };

    let credentials = match config.user(args.user.as_deref()) {
        Ok(credentials) => credentials.clone(),
        Err(e) => {
            eprintln!("❌ Error: {e}");
            eprintln!();
            eprintln!("Either set the following environment variables:");
            eprintln!("  LASTFM_USER=your_lastfm_username");
            eprintln!("  LASTFM_API_KEY=your_lastfm_api_key");
            eprintln!();
            eprintln!("or list your users in ~/.config/lastfm-charts/config.json:");
            eprintln!("  {{\"users\": [{{\"username\": \"...\", \"api_key\": \"...\"}}]}}");
            std::process::exit(1);
        }
    };

    if args.verbose {
        println!("🔐 Using user: {}", credentials.username);
    }

    let persistence = match config.persistence() {
        Ok(persistence) => persistence,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };
    if args.verbose {
        println!("💾 Cache file: {}", persistence.path().display());
    }

    let http_client = http_client::native::NativeClient::new();
    let client = LastFmApiClient::new(Box::new(http_client), credentials.api_key.clone());
    let store = BucketStore::open(
        Box::new(client.clone()),
        Box::new(persistence),
        config.fetch_options(),
    );
    let engine = ChartEngine::new(store);

    let context = CommandContext {
        engine: &engine,
        client: &client,
        user: &credentials.username,
    };

    if let Err(e) = execute_command(args.command, &context).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
