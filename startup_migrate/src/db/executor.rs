//! SQL executor
//!
//! A [`UnitOfWork`] is one transaction on one pooled connection. Dropping it
//! without calling [`UnitOfWork::commit`] rolls everything back.

use sqlx::{MySql, Postgres, Sqlite, Transaction};

use crate::error::Result;
use crate::schema::types::Dialect;

/// Transaction over any supported store
pub enum UnitOfWork {
    Postgres(Transaction<'static, Postgres>),
    MySql(Transaction<'static, MySql>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl UnitOfWork {
    pub fn dialect(&self) -> Dialect {
        match self {
            UnitOfWork::Postgres(_) => Dialect::Postgres,
            UnitOfWork::MySql(_) => Dialect::MySql,
            UnitOfWork::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Execute a single SQL statement, returning the affected row count
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let rows = match self {
            UnitOfWork::Postgres(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            UnitOfWork::MySql(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            UnitOfWork::Sqlite(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
        };
        Ok(rows)
    }

    /// Execute multiple SQL statements in order
    pub async fn execute_batch(&mut self, statements: &[String]) -> Result<u64> {
        let mut rows = 0;
        for statement in statements {
            rows += self.execute(statement).await?;
        }
        Ok(rows)
    }

    /// Run a query returning a single integer, such as `COUNT(*)`
    pub async fn fetch_count(&mut self, sql: &str) -> Result<i64> {
        let count = match self {
            UnitOfWork::Postgres(tx) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
            }
            UnitOfWork::MySql(tx) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
            }
            UnitOfWork::Sqlite(tx) => {
                sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
            }
        };
        Ok(count)
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            UnitOfWork::Postgres(tx) => tx.commit().await?,
            UnitOfWork::MySql(tx) => tx.commit().await?,
            UnitOfWork::Sqlite(tx) => tx.commit().await?,
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        match self {
            UnitOfWork::Postgres(tx) => tx.rollback().await?,
            UnitOfWork::MySql(tx) => tx.rollback().await?,
            UnitOfWork::Sqlite(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}
