//! Roghan CLI - database migrations, catalog seeding and housekeeping.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending database migrations
//! roghan-cli migrate
//!
//! # Load brands, categories, cars and products from a YAML file
//! roghan-cli seed catalog catalog.yaml
//!
//! # Grant or revoke back-office access
//! roghan-cli admin promote 09121234567
//! roghan-cli admin demote 09121234567
//!
//! # Delete expired OTP codes, stale rate-limit buckets and abandoned guest carts
//! roghan-cli maintenance purge
//! ```
//!
//! Every command reads `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) from the
//! environment or a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "roghan-cli")]
#[command(author, version, about = "Roghan CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load data into the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage back-office access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Housekeeping tasks, suitable for a cron job
    Maintenance {
        #[command(subcommand)]
        task: MaintenanceTask,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create or update catalog entries from a YAML file (matched by slug)
    Catalog {
        /// Path to the catalog YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an account the admin role
    Promote {
        /// Mobile number of the account (09xxxxxxxxx)
        phone: String,
    },
    /// Return an account to the customer role
    Demote {
        /// Mobile number of the account (09xxxxxxxxx)
        phone: String,
    },
}

#[derive(Subcommand)]
enum MaintenanceTask {
    /// Delete expired OTP codes, old rate-limit buckets and abandoned guest carts
    Purge,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roghan_cli=info,roghan_storefront=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { phone } => commands::admin::promote(&phone).await?,
            AdminAction::Demote { phone } => commands::admin::demote(&phone).await?,
        },
        Commands::Maintenance { task } => match task {
            MaintenanceTask::Purge => commands::maintenance::purge().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_seed_catalog() {
        let cli = Cli::try_parse_from(["roghan-cli", "seed", "catalog", "data/catalog.yaml"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Seed { target: SeedTarget::Catalog { file } }) if file == PathBuf::from("data/catalog.yaml")
        ));
    }

    #[test]
    fn test_admin_requires_phone() {
        assert!(Cli::try_parse_from(["roghan-cli", "admin", "promote"]).is_err());
    }
}
