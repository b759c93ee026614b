//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use startup_migrate::config::{DatabaseConfig, Driver, FailurePolicy};
use startup_migrate::db::connection::DatabaseConnection;
use startup_migrate::retry::RetryPolicy;
use startup_migrate::schema::migration::{SchemaManager, SyncReport};
use startup_migrate::seed::{SeedOutcome, Seeder};
use startup_migrate::startup::StartupSettings;
use startup_migrate::{Error, Result};

pub const HISTORY_TABLE: &str = "__schema_history";

pub fn sqlite_config(dir: &TempDir, file: &str) -> DatabaseConfig {
    DatabaseConfig {
        driver: Driver::Sqlite,
        url: format!("sqlite://{}?mode=rwc", dir.path().join(file).display()),
        url_env: None,
        pool_size: 2,
        timeout_seconds: 5,
    }
}

pub async fn sqlite_connection(dir: &TempDir, file: &str) -> DatabaseConnection {
    DatabaseConnection::connect(&sqlite_config(dir, file))
        .await
        .expect("sqlite handle")
}

pub fn fast_settings(on_failure: FailurePolicy) -> StartupSettings {
    StartupSettings {
        migrate_policy: RetryPolicy::constant(Duration::from_millis(10), 3),
        seed_policy: RetryPolicy::constant(Duration::from_millis(10), 3),
        on_failure,
    }
}

pub fn transient() -> Error {
    Error::from(sqlx::Error::PoolTimedOut)
}

/// Schema manager failing a fixed number of times before delegating
pub struct FlakySchema<S> {
    pub inner: S,
    pub failures: usize,
    pub transient: bool,
    pub calls: AtomicUsize,
}

impl<S> FlakySchema<S> {
    pub fn new(inner: S, failures: usize, transient: bool) -> Self {
        Self {
            inner,
            failures,
            transient,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: SchemaManager> SchemaManager for FlakySchema<S> {
    async fn apply_pending_migrations(&self, connection: &DatabaseConnection) -> Result<SyncReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(if self.transient {
                transient()
            } else {
                Error::MigrationError("column type conflict".to_string())
            });
        }
        self.inner.apply_pending_migrations(connection).await
    }
}

/// Seeder failing transiently a fixed number of times before delegating
pub struct FlakySeed<S> {
    pub inner: S,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl<S> FlakySeed<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Seeder> Seeder for FlakySeed<S> {
    fn name(&self) -> &str {
        "FlakySeed"
    }

    async fn seed(&self, connection: &DatabaseConnection) -> Result<SeedOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(transient());
        }
        self.inner.seed(connection).await
    }
}

/// In-memory log sink for asserting on formatted tracing output
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
