use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::error;

use heron::commands;
use heron::config::Config;
use heron::db::Database;
use heron::logging::configure_logging;

#[derive(Parser)]
#[command(name = "heron", version, about = "Follow RSS feeds and collect their posts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a user and log in
    Register { name: String },
    /// Switch to an existing user
    Login { name: String },
    /// Delete all users, feeds, and posts
    Reset,
    /// List users
    Users,
    /// Run the feed ingestion loop, e.g. `heron agg 1m`
    Agg { interval: String },
    /// Add a feed and follow it
    Addfeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse { limit: Option<i64> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging();

    let mut config = Config::read()?;
    let db = Database::new(&config.db_path).await?;

    match cli.command {
        Command::Register { name } => commands::register(&db, &mut config, &name).await,
        Command::Login { name } => commands::login(&db, &mut config, &name).await,
        Command::Reset => commands::reset(&db).await,
        Command::Users => commands::users(&db, &config).await,
        Command::Agg { interval } => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_err() {
                    error!("Failed to listen for ctrl-c");
                }
                let _ = shutdown_tx.send(true);
            });
            commands::aggregate(&db, &interval, shutdown_rx).await
        }
        Command::Addfeed { name, url } => commands::add_feed(&db, &config, &name, &url).await,
        Command::Feeds => commands::feeds(&db).await,
        Command::Follow { url } => commands::follow(&db, &config, &url).await,
        Command::Following => commands::following(&db, &config).await,
        Command::Unfollow { url } => commands::unfollow(&db, &config, &url).await,
        Command::Browse { limit } => commands::browse(&db, &config, limit).await,
    }
}
