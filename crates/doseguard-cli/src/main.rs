use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod platform;

#[derive(Parser)]
#[command(name = "doseguard", version, about = "doseguard medication reminder CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch doses from the backend and schedule their alerts
    Sync {
        #[command(flatten)]
        session: commands::SessionArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached doses
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync status for a session
    Status {
        #[command(flatten)]
        session: commands::SessionArgs,
    },
    /// List live alert handles
    Handles {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deliver an alert payload as if the platform fired it
    Deliver(commands::alert::DeliverArgs),
    /// Acknowledge a dose with photo evidence
    Ack(commands::proof::AckArgs),
    /// Push token management
    Token {
        #[command(subcommand)]
        action: commands::token::TokenAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sync { session, json } => commands::dose::sync(session, json).await,
        Commands::List { json } => commands::dose::list(json),
        Commands::Status { session } => commands::dose::status(session),
        Commands::Handles { json } => commands::dose::handles(json),
        Commands::Deliver(args) => commands::alert::run(args),
        Commands::Ack(args) => commands::proof::run(args).await,
        Commands::Token { action } => commands::token::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
