// booknotes - reading journal server
// Entry point: CLI parsing, logging setup and subcommand dispatch

use anyhow::Context;
use booknotes::config::ServerConfig;
use booknotes::{api, app, services};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "booknotes", version, about = "Reading journal server")]
struct Cli {
    /// JSON configuration file; BOOKNOTES_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Fill the database with demo books and notes
    Seed,
    /// Create a user account
    CreateUser {
        username: String,
        #[arg(long, env = "BOOKNOTES_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booknotes=debug,tower_http=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = ServerConfig::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    let state = app::setup(config)
        .await
        .context("failed to initialize application")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("Starting booknotes server");
            api::serve(state).await.context("server error")?;
        }
        Command::Seed => {
            let summary = services::seed_demo_data(&state.repo).await?;
            println!(
                "Seeded {} books with {} notes",
                summary.books, summary.notes
            );
        }
        Command::CreateUser { username, password } => {
            let user = state.auth.create_user(&username, &password).await?;
            println!("Created user {} (id {})", user.username, user.id);
        }
    }

    Ok(())
}
