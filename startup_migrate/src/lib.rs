//! startup_migrate: brings independent databases up to date at service startup
//!
//! For every configured database the startup sequence applies pending schema
//! migrations, inserts baseline seed data when it is missing, and retries
//! both around transient connectivity errors before the HTTP listener starts.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;
pub mod schema;
pub mod seed;
pub mod server;
pub mod startup;
pub mod utils;

// Re-export main types for easier access
pub use config::{Config, FailurePolicy};
pub use db::connection::DatabaseConnection;
pub use error::{Error, Phase, Result};
pub use models::LogicalDatabase;
pub use retry::RetryPolicy;
pub use schema::analyzer::SchemaAnalyzer;
pub use schema::migration::{Migrator, SchemaManager, SyncReport};
pub use seed::{SeedOutcome, Seeder};
pub use startup::{StartupReport, StartupSequencer};

/// Load configuration from `config_path` (defaults when `None`) and apply
/// environment overrides for connection strings
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => config::load_from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Run the migrate-and-seed sequence for every configured database
pub async fn run_startup(config: &Config) -> Result<StartupReport> {
    StartupSequencer::from_config(config)?.run().await
}
