use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbvault::cli::{
    handle_backup, handle_history, handle_list, handle_prune, handle_restore, handle_verify,
};
use dbvault::config::Settings;

#[derive(Parser)]
#[command(
    name = "dbvault",
    version,
    about = "Verified, retained PostgreSQL backups with guarded restores",
    long_about = "dbvault takes gzip-compressed logical backups of a PostgreSQL database, \
                  through a running container or the host's client tools, verifies \
                  every archive it writes and prunes old ones. Restores require two \
                  explicit confirmations and take a safety backup first.\n\n\
                  Configuration is read from POSTGRES_DB, POSTGRES_USER, \
                  POSTGRES_PASSWORD, POSTGRES_HOST, POSTGRES_PORT, DB_CONTAINER, \
                  CONTAINER_RUNTIME, BACKUP_DIR, BACKUP_LOG and BACKUP_RETENTION_DAYS."
)]
struct Cli {
    /// Enable debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up the database and prune expired archives
    Backup {
        /// Override BACKUP_RETENTION_DAYS for this run
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Restore the database from an archive
    Restore {
        /// Archive path, filename, list number or 'latest'; prompts when omitted
        selector: Option<String>,
    },

    /// List archives of the configured database
    #[command(alias = "ls")]
    List,

    /// Check that an archive decompresses cleanly
    Verify {
        /// Archive path, filename, list number or 'latest'
        selector: String,
    },

    /// Delete primary archives older than the retention window
    Prune {
        /// Override BACKUP_RETENTION_DAYS for this run
        #[arg(long)]
        retention_days: Option<u32>,
        /// Only show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Show recent operation log entries
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    tracing::debug!(?settings, "loaded settings");

    match cli.command {
        Commands::Backup { retention_days } => handle_backup(&settings, retention_days)?,
        Commands::Restore { selector } => handle_restore(&settings, selector.as_deref())?,
        Commands::List => handle_list(&settings)?,
        Commands::Verify { selector } => handle_verify(&settings, &selector)?,
        Commands::Prune {
            retention_days,
            dry_run,
        } => handle_prune(&settings, retention_days, dry_run)?,
        Commands::History { limit } => handle_history(&settings, limit)?,
    }

    Ok(())
}
