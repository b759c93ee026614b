//! Database connection handling
//!
//! This module provides the row-store handle used by the startup sequence.

use std::time::Duration;

use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, MySql, Pool,
    Postgres, Sqlite,
};

use crate::config::{DatabaseConfig, Driver};
use crate::db::executor::UnitOfWork;
use crate::error::{Error, Result};
use crate::schema::types::Dialect;

/// Enumeration of supported database types
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

impl DatabaseConnection {
    /// Create a handle from configuration.
    ///
    /// The pool connects lazily: nothing touches the network until the first
    /// statement runs, so connectivity problems surface inside the retried
    /// phases instead of here. A malformed URL is still rejected immediately.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::ConfigError(
                "database url must not be empty".to_string(),
            ));
        }

        let pool_size = config.pool_size.max(1);
        let timeout = Duration::from_secs(config.timeout_seconds);

        let connection = match config.driver {
            Driver::Postgres => DatabaseConnection::Postgres(
                PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect_lazy(&config.url)
                    .map_err(config_error)?,
            ),
            Driver::Mysql => DatabaseConnection::MySql(
                MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect_lazy(&config.url)
                    .map_err(config_error)?,
            ),
            Driver::Sqlite => DatabaseConnection::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect_lazy(&config.url)
                    .map_err(config_error)?,
            ),
        };

        Ok(connection)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DatabaseConnection::Postgres(_) => Dialect::Postgres,
            DatabaseConnection::MySql(_) => Dialect::MySql,
            DatabaseConnection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Execute a SQL statement outside of any transaction
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let rows = match self {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query(sql).execute(pool).await?.rows_affected()
            }
            DatabaseConnection::MySql(pool) => {
                sqlx::query(sql).execute(pool).await?.rows_affected()
            }
            DatabaseConnection::Sqlite(pool) => {
                sqlx::query(sql).execute(pool).await?.rows_affected()
            }
        };
        Ok(rows)
    }

    /// Run a query returning a single integer, such as `COUNT(*)`
    pub async fn fetch_count(&self, sql: &str) -> Result<i64> {
        let count = match self {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?
            }
            DatabaseConnection::MySql(pool) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?
            }
            DatabaseConnection::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?
            }
        };
        Ok(count)
    }

    /// Start a unit of work on a dedicated connection
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let unit = match self {
            DatabaseConnection::Postgres(pool) => UnitOfWork::Postgres(pool.begin().await?),
            DatabaseConnection::MySql(pool) => UnitOfWork::MySql(pool.begin().await?),
            DatabaseConnection::Sqlite(pool) => UnitOfWork::Sqlite(pool.begin().await?),
        };
        Ok(unit)
    }

    /// Release every pooled connection
    pub async fn close(&self) {
        match self {
            DatabaseConnection::Postgres(pool) => pool.close().await,
            DatabaseConnection::MySql(pool) => pool.close().await,
            DatabaseConnection::Sqlite(pool) => pool.close().await,
        }
    }
}

fn config_error(error: sqlx::Error) -> Error {
    Error::ConfigError(format!("Invalid database url: {}", error))
}

/// Mask the password part of a connection URL for logging
pub fn redact_url(url: &str) -> String {
    let Some((auth_part, host_part)) = url.rsplit_once('@') else {
        return url.to_string();
    };
    let Some((scheme, credentials)) = auth_part.split_once("://") else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host_part),
        None => url.to_string(),
    }
}
