//! Nature Marketplace CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! nm-cli migrate
//!
//! # Grant or revoke staff rights
//! nm-cli staff grant --email ana@example.com
//! nm-cli staff revoke --email ana@example.com
//!
//! # Print the badge catalog
//! nm-cli badges list
//! ```
//!
//! Every command reads `API_DATABASE_URL` (or `DATABASE_URL`) after loading
//! `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "nm-cli")]
#[command(author, version, about = "Nature Marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations from crates/api/migrations
    Migrate,
    /// Manage staff rights
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
    /// Inspect the badge catalog
    Badges {
        #[command(subcommand)]
        action: BadgesAction,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Give an existing account staff rights
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Take staff rights away from an account
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum BadgesAction {
    /// List every badge with its point value
    List,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Staff { action } => match action {
            StaffAction::Grant { email } => commands::staff::set_staff(&email, true).await,
            StaffAction::Revoke { email } => commands::staff::set_staff(&email, false).await,
        },
        Commands::Badges {
            action: BadgesAction::List,
        } => commands::badges::list().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_staff_grant() {
        let cli = Cli::try_parse_from(["nm-cli", "staff", "grant", "--email", "ana@selva.org"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Staff {
                action: StaffAction::Grant { ref email }
            } if email == "ana@selva.org"
        ));
    }

    #[test]
    fn test_staff_requires_email() {
        assert!(Cli::try_parse_from(["nm-cli", "staff", "revoke"]).is_err());
    }
}
