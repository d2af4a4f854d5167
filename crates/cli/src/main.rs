//! Realty CLI - command-line front end for the realty portals.
//!
//! # Usage
//!
//! ```bash
//! # Sign into the admin console (password from REALTY_PASSWORD or stdin)
//! realty login --role admin admin@example.com
//!
//! # Refresh every queue and print dashboard counters
//! realty stats
//!
//! # Approve an agent awaiting review
//! realty approve agent 42 --notes "Licence checked"
//!
//! # Reject a company
//! realty reject company 7 --reason "Missing registration"
//! ```
//!
//! Sessions persist in `REALTY_SESSION_FILE` between invocations, one slot
//! per role.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use realty_client::{ClientConfig, FileStorage, LogFormat, Portal};
use realty_core::{EntityId, EntityKind, PropertyId, QueueId, RoleNamespace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "realty")]
#[command(author, version, about = "Realty portal and admin console CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in; the account's role decides which slot it lands in
    Login {
        /// Email or username
        identifier: String,

        /// Portal being signed into (`buyer`, `admin`, `company`, `agent`)
        #[arg(short, long, default_value = "buyer")]
        role: RoleNamespace,
    },
    /// Sign out of one role
    Logout {
        #[arg(short, long)]
        role: RoleNamespace,
    },
    /// Show every signed-in slot
    Whoami,
    /// Request a password reset link
    ForgotPassword { identifier: String },
    /// Set a new password from a reset token (new password from
    /// REALTY_PASSWORD or stdin)
    ResetPassword {
        #[arg(short, long)]
        token: String,
    },
    /// Refresh admin queues (all of them by default)
    Refresh {
        #[arg(short, long)]
        queue: Vec<QueueId>,
    },
    /// Refresh and print one queue
    Queue { queue: QueueId },
    /// Refresh every queue and print dashboard counters
    Stats,
    /// Verified and pending company counts from the server
    CompanyStats,
    /// List documents uploaded for an agent or company
    Documents { kind: EntityKind, id: EntityId },
    /// Approve a pending entity
    Approve {
        kind: EntityKind,
        id: EntityId,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Reject a pending entity
    Reject {
        kind: EntityKind,
        id: EntityId,
        #[arg(short, long)]
        reason: String,
        #[arg(short, long)]
        details: Option<String>,
    },
    /// Add a phase to a project
    AddPhase {
        project: EntityId,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Extra text field as `key=value`
        #[arg(short, long)]
        field: Vec<String>,
        /// File to attach
        #[arg(long)]
        file: Vec<PathBuf>,
    },
    /// Manage favorited properties
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    Add { id: PropertyId },
    Remove { id: PropertyId },
    Toggle { id: PropertyId },
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "realty_client=info,realty_cli=info".into());

    let json_layer = (format == LogFormat::Json)
        .then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr)
        });
    let text_layer = (format == LogFormat::Text)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(FileStorage::open(&config.session_file)?);
    let portal = Portal::new(config, storage).await?;

    let result = match cli.command {
        Commands::Login { identifier, role } => {
            commands::session::login(&portal, &identifier, role).await
        }
        Commands::Logout { role } => commands::session::logout(&portal, role).await,
        Commands::Whoami => commands::session::whoami(&portal).await,
        Commands::ForgotPassword { identifier } => {
            commands::session::forgot_password(&portal, &identifier).await
        }
        Commands::ResetPassword { token } => {
            commands::session::reset_password(&portal, token).await
        }
        Commands::Refresh { queue } => commands::console::refresh(&portal, &queue).await,
        Commands::Queue { queue } => commands::console::show_queue(&portal, queue).await,
        Commands::Stats => commands::console::stats(&portal).await,
        Commands::CompanyStats => commands::console::company_stats(&portal).await,
        Commands::Documents { kind, id } => commands::console::documents(&portal, kind, id).await,
        Commands::Approve { kind, id, notes } => {
            commands::console::approve(&portal, kind, id, notes.as_deref()).await
        }
        Commands::Reject {
            kind,
            id,
            reason,
            details,
        } => commands::console::reject(&portal, kind, id, &reason, details.as_deref()).await,
        Commands::AddPhase {
            project,
            name,
            description,
            field,
            file,
        } => commands::console::add_phase(&portal, project, name, description, &field, &file).await,
        Commands::Favorites { action } => match action {
            FavoritesAction::List => commands::favorites::list(&portal).await,
            FavoritesAction::Add { id } => commands::favorites::add(&portal, id).await,
            FavoritesAction::Remove { id } => commands::favorites::remove(&portal, id).await,
            FavoritesAction::Toggle { id } => commands::favorites::toggle(&portal, id).await,
        },
    };

    commands::print_notices(&portal);
    result
}
