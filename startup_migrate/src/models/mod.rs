//! Models module for startup_migrate
//!
//! Entities and migration sets of the two logical databases.

pub mod event_log;
pub mod order;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{Config, DatabaseConfig};
use crate::error::{Error, Result};
use crate::schema::migration::{MigrationSet, Migrator};
use crate::seed::{OrdersSeed, Seeder};

// Re-export key types
pub use event_log::EventLogEntry;
pub use order::Order;

/// The independently connected databases this service owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalDatabase {
    Orders,
    EventLog,
}

impl LogicalDatabase {
    /// Startup order
    pub const ALL: [LogicalDatabase; 2] = [LogicalDatabase::Orders, LogicalDatabase::EventLog];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalDatabase::Orders => "orders",
            LogicalDatabase::EventLog => "event_log",
        }
    }

    pub fn config<'a>(&self, config: &'a Config) -> &'a DatabaseConfig {
        match self {
            LogicalDatabase::Orders => &config.databases.orders,
            LogicalDatabase::EventLog => &config.databases.event_log,
        }
    }

    pub fn migrations(&self) -> Result<MigrationSet> {
        match self {
            LogicalDatabase::Orders => order::migrations(),
            LogicalDatabase::EventLog => event_log::migrations(),
        }
    }

    pub fn migrator(&self, config: &Config) -> Result<Migrator> {
        Ok(Migrator::new(self.migrations()?, &config.migrations.history_table)
            .transaction_per_migration(config.migrations.transaction_per_migration))
    }

    /// Baseline data, for the databases that have any
    pub fn seeder(&self) -> Option<Arc<dyn Seeder>> {
        match self {
            LogicalDatabase::Orders => Some(Arc::new(OrdersSeed)),
            LogicalDatabase::EventLog => None,
        }
    }
}

impl fmt::Display for LogicalDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalDatabase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LogicalDatabase::ALL
            .into_iter()
            .find(|db| db.name() == s)
            .ok_or_else(|| Error::ConfigError(format!("Unknown database: {}", s)))
    }
}
