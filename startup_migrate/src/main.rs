use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use startup_migrate::db::connection::DatabaseConnection;
use startup_migrate::schema::migration::MigrationStatus;
use startup_migrate::utils::logging::init_logging;
use startup_migrate::{load_config, run_startup, server, LogicalDatabase};

#[derive(Parser)]
#[command(name = "startup_migrate", version, about = "Migrate and seed databases, then serve")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the startup sequence, then start the HTTP listener (default)
    Serve,
    /// Run the startup sequence and exit
    Migrate,
    /// Show applied and pending migrations for every database
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Revert the most recently applied migration of one database
    Rollback {
        /// `orders` or `event_log`
        #[arg(long)]
        database: LogicalDatabase,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let report = run_startup(&config).await?;
            if !report.all_ready() {
                tracing::warn!(
                    failed = report.failures().count(),
                    "Starting with databases that did not migrate"
                );
            }
            server::serve(&config.server).await?;
        }
        Command::Migrate => {
            let report = run_startup(&config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_ready() {
                bail!("{} database(s) failed to migrate", report.failures().count());
            }
        }
        Command::Status { json } => {
            let mut all = Vec::new();
            for database in LogicalDatabase::ALL {
                let connection = DatabaseConnection::connect(database.config(&config)).await?;
                let status = database.migrator(&config)?.status(&connection).await;
                connection.close().await;
                all.push((database.name(), status?));
            }
            if json {
                let map: serde_json::Map<String, serde_json::Value> = all
                    .iter()
                    .map(|(name, status)| Ok((name.to_string(), serde_json::to_value(status)?)))
                    .collect::<serde_json::Result<_>>()?;
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (name, status) in &all {
                    print_status(name, status);
                }
            }
        }
        Command::Rollback { database } => {
            let connection = DatabaseConnection::connect(database.config(&config)).await?;
            let reverted = database.migrator(&config)?.revert_last(&connection).await;
            connection.close().await;
            match reverted? {
                Some(id) => println!("{}: reverted {}", database, id),
                None => println!("{}: nothing to revert", database),
            }
        }
    }

    Ok(())
}

fn print_status(database: &str, status: &[MigrationStatus]) {
    println!("{}", database);
    for migration in status {
        match &migration.applied {
            Some(applied) => println!("  [x] {} (applied {})", migration.id, applied.applied_at),
            None => println!("  [ ] {}", migration.id),
        }
    }
}
