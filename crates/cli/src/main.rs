//! DripHub CLI - Database migrations and account tooling.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! driphub-cli migrate
//!
//! # Create a local password account
//! driphub-cli user create -e admin@example.com -p 'hunter2!' --superuser
//!
//! # Create an account at the identity provider (service-role key required)
//! driphub-cli provider create-user -e test@example.com -p 'pw' --auto-confirm
//!
//! # Probe the identity provider
//! driphub-cli provider health
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "driphub-cli")]
#[command(author, version, about = "DripHub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage local users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Talk to the identity provider
    Provider {
        #[command(subcommand)]
        action: ProviderAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a local password account
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,

        /// Grant administrative rights
        #[arg(long)]
        superuser: bool,
    },
}

#[derive(Subcommand)]
enum ProviderAction {
    /// Create an account via the provider's admin endpoint
    CreateUser {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,

        /// Mark the email as confirmed
        #[arg(long)]
        auto_confirm: bool,
    },
    /// Probe the provider base URL
    Health,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                superuser,
            } => commands::user::create(&email, &password, superuser).await?,
        },
        Commands::Provider { action } => match action {
            ProviderAction::CreateUser {
                email,
                password,
                auto_confirm,
            } => commands::provider::create_user(&email, &password, auto_confirm).await?,
            ProviderAction::Health => commands::provider::health().await?,
        },
    }
    Ok(())
}
