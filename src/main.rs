use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use lukewarm::config::{self, FilterProfile};

/// Lukewarm: likes-velocity feed curation for Bluesky.
///
/// Watches the firehose for young posts gathering likes at a modest pace
/// and maintains a persisted feed index of them: not dead, not viral,
/// pleasantly lukewarm.
#[derive(Parser)]
#[command(name = "lukewarm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Consume the firehose and curate the feed index
    Run,

    /// Show system status (feed size, cursor, DB stats)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lukewarm=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing lukewarm database...");
            let config = config::Config::load()?;
            let conn = lukewarm::db::initialize(&config.db_path)?;
            let table_count = lukewarm::db::schema::table_count(&conn)?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nLukewarm is ready. Next step: set up your .env file");
            println!("  (see .env.example for the required variables)");
            println!("\nThen run: cargo run -- run");
        }

        Commands::Run => {
            let config = config::Config::load()?;
            let settings = config.require_engine()?;
            let conn = lukewarm::db::initialize(&config.db_path)?;

            // The strict profile needs the lookup collaborator; minimal
            // runs entirely from the stream.
            let agent: Option<Arc<dyn lukewarm::bluesky::agent::AgentView>> =
                match config.filter_profile {
                    FilterProfile::Strict => {
                        info!("Using strict filter profile with public API lookups");
                        let client = lukewarm::bluesky::client::PublicAtpClient::new(
                            &config.public_api_url,
                        )?;
                        Some(Arc::new(client))
                    }
                    FilterProfile::Minimal => {
                        info!("Using minimal filter profile (reply-only, no lookups)");
                        None
                    }
                };

            let filter_config = lukewarm::engine::filter_config(
                config.filter_profile,
                &settings,
                config.min_author_posts,
                config.reject_languages.clone(),
            );
            let mut engine =
                lukewarm::engine::CurationEngine::new(&settings, filter_config, agent)?;

            println!("{}", "Starting feed curation...".bold());
            println!("  Subscription: {}", config.subscription_endpoint);
            println!("  Like window: {}..={}", settings.min_threshold, settings.max_threshold);
            println!(
                "  Age window: {}ms..={}ms",
                settings.min_age_of_post_ms, settings.max_age_of_post_ms
            );

            lukewarm::pipeline::ingest::run(&config.subscription_endpoint, &conn, &mut engine)
                .await?;
        }

        Commands::Status => {
            let config = config::Config::load()?;
            let conn = lukewarm::db::open(&config.db_path)?;
            lukewarm::status::show(&conn, &config.db_path, &config.subscription_endpoint)?;
        }
    }

    Ok(())
}
