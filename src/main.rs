//! Friendly CLI - Lightweight FriendlyChat client
//!
//! A terminal-based chat client for Linux.

mod api;
mod auth;
mod config;
mod models;
mod stream;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "friendly-cli")]
#[command(about = "Lightweight CLI client for FriendlyChat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password (or Google)
    Login {
        /// Force interactive sign-in even if cached token exists
        #[arg(short, long)]
        force: bool,

        /// Sign in with a Google account instead of email/password
        #[arg(short, long)]
        google: bool,
    },

    /// Sign out and clear cached credentials
    Logout,

    /// Show current authentication status
    Status,

    /// Read recent messages
    Read {
        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a text message
    Send {
        /// Message content
        message: String,
    },

    /// Upload a photo and send it as a message
    SendPhoto {
        /// Path to the image file
        path: PathBuf,
    },

    /// Show the active message length limit
    Limit,

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login { force, google } => {
            tracing::info!("Starting sign-in flow...");
            auth::login(force, google).await?;
        }
        Commands::Logout => {
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Read { limit } => {
            api::read_messages(limit).await?;
        }
        Commands::Send { message } => {
            tracing::info!("Sending message...");
            api::send_message(&message).await?;
        }
        Commands::SendPhoto { path } => {
            tracing::info!("Uploading photo...");
            api::send_photo(&path).await?;
        }
        Commands::Limit => {
            api::show_limit().await?;
        }
        Commands::Tui => {
            tui::run().await?;
        }
    }

    Ok(())
}
