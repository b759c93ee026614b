//! Seed data
//!
//! A [`Seeder`] inserts baseline rows into a migrated database when they are
//! missing. Running it against an already-seeded database is the normal case
//! and must succeed without writing anything.

pub mod orders;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub use orders::OrdersSeed;

/// What a seed run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOutcome {
    Inserted(u64),
    AlreadySeeded,
}

#[async_trait]
pub trait Seeder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Insert baseline data if absent, then commit
    async fn seed(&self, connection: &DatabaseConnection) -> Result<SeedOutcome>;
}

/// Run a seeder under its own retry policy
pub async fn seed_with_retry(
    seeder: &dyn Seeder,
    connection: &DatabaseConnection,
    policy: &RetryPolicy,
) -> Result<SeedOutcome> {
    let max_retries = policy.max_retries();
    let outcome = policy
        .execute(
            move || seeder.seed(connection),
            Error::is_transient,
            |error, delay, retry| {
                tracing::trace!(
                    seeder = seeder.name(),
                    delay_ms = delay.as_millis() as u64,
                    "[{}] Exception {} with message {} detected on attempt {} of {}",
                    seeder.name(),
                    error.kind(),
                    error,
                    retry,
                    max_retries
                );
            },
        )
        .await?;

    match outcome {
        SeedOutcome::Inserted(rows) => {
            tracing::info!(seeder = seeder.name(), rows, "Seed data inserted")
        }
        SeedOutcome::AlreadySeeded => {
            tracing::debug!(seeder = seeder.name(), "Seed data already present")
        }
    }

    Ok(outcome)
}
