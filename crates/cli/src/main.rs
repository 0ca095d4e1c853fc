//! Handover CLI - Database migrations and principal management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! handover migrate
//!
//! # Make sure the admin principal exists
//! handover admin ensure -e admin@example.com
//!
//! # Create a driver and print its magic link
//! handover driver create -n "Dana" --notes "Van 3"
//!
//! # Replace or remove a driver's magic link
//! handover driver rotate-link <DRIVER_ID>
//! handover driver revoke-link <DRIVER_ID>
//!
//! # Seed a demo driver and delivery
//! handover seed
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "handover")]
#[command(author, version, about = "Handover CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the admin principal
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage drivers and their magic links
    Driver {
        #[command(subcommand)]
        action: DriverAction,
    },
    /// Seed a demo driver and delivery if no drivers exist
    Seed,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create the admin principal if it does not exist
    Ensure {
        /// Admin email address (defaults to `ADMIN_EMAIL`)
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum DriverAction {
    /// Create a driver with a magic link
    Create {
        /// Driver display name
        #[arg(short, long)]
        name: Option<String>,

        /// Free-form notes (vehicle, plates)
        #[arg(long)]
        notes: Option<String>,
    },
    /// List drivers with their magic links
    List,
    /// Replace a driver's magic link; the old link stops working
    RotateLink {
        /// Driver ID
        id: String,
    },
    /// Remove a driver's magic link
    RevokeLink {
        /// Driver ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Ensure { email } => commands::admin::ensure(email.as_deref()).await?,
        },
        Commands::Driver { action } => match action {
            DriverAction::Create { name, notes } => commands::driver::create(name, notes).await?,
            DriverAction::List => commands::driver::list().await?,
            DriverAction::RotateLink { id } => commands::driver::rotate_link(&id).await?,
            DriverAction::RevokeLink { id } => commands::driver::revoke_link(&id).await?,
        },
        Commands::Seed => commands::seed::demo().await?,
    }
    Ok(())
}
