//! Quill CLI - Database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Create the schema and the session table
//! quill-cli migrate
//!
//! # Insert demo users, follows and posts
//! quill-cli seed
//!
//! # Wipe existing demo data first
//! quill-cli seed --reset
//! ```
//!
//! Both commands read `QUILL_DATABASE_URL` (falling back to `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quill-cli")]
#[command(author, version, about = "Quill CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations (app schema and session store)
    Migrate,
    /// Seed the database with demo profiles and posts
    Seed {
        /// Delete previously seeded demo users before inserting
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { reset } => commands::seed::run(reset).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_seed_reset() {
        let cli = Cli::try_parse_from(["quill-cli", "seed", "--reset"]).expect("valid args");
        assert!(matches!(cli.command, Commands::Seed { reset: true }));
    }
}
