//! Startup sequence
//!
//! For each database, in order: open a handle, bring its schema up to date,
//! insert seed data, release the handle. The schema and seed phases run
//! under the outer retry policy, and seeding has its own inner policy as
//! well. A database that still fails once retries are spent is either logged
//! and skipped or aborts the whole sequence, depending on [`FailurePolicy`].

use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, DatabaseConfig, FailurePolicy};
use crate::db::connection::{redact_url, DatabaseConnection};
use crate::error::{Error, Phase, Result};
use crate::models::LogicalDatabase;
use crate::retry::RetryPolicy;
use crate::schema::migration::{synchronize, SchemaManager, SyncReport};
use crate::seed::{seed_with_retry, SeedOutcome, Seeder};

/// Retry and failure handling for the whole sequence
#[derive(Debug, Clone)]
pub struct StartupSettings {
    pub migrate_policy: RetryPolicy,
    pub seed_policy: RetryPolicy,
    pub on_failure: FailurePolicy,
}

impl From<&Config> for StartupSettings {
    fn from(config: &Config) -> Self {
        Self {
            migrate_policy: RetryPolicy::from_delays(config.retry.migrate_delays()),
            seed_policy: RetryPolicy::from_delays(config.retry.seed_delays()),
            on_failure: config.startup.on_failure,
        }
    }
}

/// One database to bring up
#[derive(Clone)]
pub struct DatabaseTarget {
    pub name: String,
    pub config: DatabaseConfig,
    pub schema: Arc<dyn SchemaManager>,
    pub seeder: Option<Arc<dyn Seeder>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseOutcome {
    Ready {
        sync: SyncReport,
        seed: Option<SeedOutcome>,
    },
    Failed {
        phase: Phase,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseReport {
    pub database: String,
    pub outcome: DatabaseOutcome,
}

/// Result of a whole startup sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StartupReport {
    pub databases: Vec<DatabaseReport>,
}

impl StartupReport {
    pub fn all_ready(&self) -> bool {
        self.databases
            .iter()
            .all(|d| matches!(d.outcome, DatabaseOutcome::Ready { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &DatabaseReport> {
        self.databases
            .iter()
            .filter(|d| matches!(d.outcome, DatabaseOutcome::Failed { .. }))
    }

    pub fn get(&self, database: &str) -> Option<&DatabaseOutcome> {
        self.databases
            .iter()
            .find(|d| d.database == database)
            .map(|d| &d.outcome)
    }
}

/// Runs migrate-and-seed for every registered database, one after another
pub struct StartupSequencer {
    settings: StartupSettings,
    targets: Vec<DatabaseTarget>,
}

impl StartupSequencer {
    pub fn new(settings: StartupSettings) -> Self {
        Self {
            settings,
            targets: Vec::new(),
        }
    }

    /// Orders (with seed data) first, then the event log
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut sequencer = Self::new(StartupSettings::from(config));
        for database in LogicalDatabase::ALL {
            sequencer = sequencer.add_target(DatabaseTarget {
                name: database.name().to_string(),
                config: database.config(config).clone(),
                schema: Arc::new(database.migrator(config)?),
                seeder: database.seeder(),
            });
        }
        Ok(sequencer)
    }

    pub fn add_target(mut self, target: DatabaseTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Run the sequence for every target
    pub async fn run(&self) -> Result<StartupReport> {
        let mut report = StartupReport::default();

        for target in &self.targets {
            tracing::info!(
                database = %target.name,
                url = %redact_url(&target.config.url),
                "Migrating database"
            );

            let outcome = match self.run_target(target).await {
                Ok((sync, seed)) => {
                    tracing::info!(database = %target.name, "Migrated database");
                    DatabaseOutcome::Ready { sync, seed }
                }
                Err(error) => {
                    let phase = failed_phase(&error);
                    tracing::error!(
                        database = %target.name,
                        phase = %phase,
                        error = %error,
                        "An error occurred while migrating the database"
                    );
                    if self.settings.on_failure == FailurePolicy::Abort {
                        return Err(error);
                    }
                    DatabaseOutcome::Failed {
                        phase,
                        error: error.to_string(),
                    }
                }
            };

            report.databases.push(DatabaseReport {
                database: target.name.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    async fn run_target(
        &self,
        target: &DatabaseTarget,
    ) -> Result<(SyncReport, Option<SeedOutcome>)> {
        let connection = DatabaseConnection::connect(&target.config)
            .await
            .map_err(|e| startup_error(&target.name, Phase::Connect, e))?;

        let result = self.migrate_and_seed(target, &connection).await;
        connection.close().await;
        result
    }

    async fn migrate_and_seed(
        &self,
        target: &DatabaseTarget,
        connection: &DatabaseConnection,
    ) -> Result<(SyncReport, Option<SeedOutcome>)> {
        let name = target.name.as_str();
        let schema = target.schema.as_ref();
        let seeder = target.seeder.as_deref();
        let seed_policy = &self.settings.seed_policy;

        self.settings
            .migrate_policy
            .execute(
                move || async move {
                    let sync = synchronize(schema, name, connection)
                        .await
                        .map_err(|e| startup_error(name, Phase::Schema, e))?;

                    let seed = match seeder {
                        Some(seeder) => Some(
                            seed_with_retry(seeder, connection, seed_policy)
                                .await
                                .map_err(|e| startup_error(name, Phase::Seed, e))?,
                        ),
                        None => None,
                    };

                    Ok::<_, Error>((sync, seed))
                },
                Error::is_transient,
                |error, delay, retry| {
                    tracing::warn!(
                        database = name,
                        attempt = retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure while migrating, retrying"
                    );
                },
            )
            .await
    }
}

fn startup_error(database: &str, phase: Phase, source: Error) -> Error {
    Error::Startup {
        database: database.to_string(),
        phase,
        source: Box::new(source),
    }
}

fn failed_phase(error: &Error) -> Phase {
    match error {
        Error::Startup { phase, .. } => *phase,
        _ => Phase::Connect,
    }
}
