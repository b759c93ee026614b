//! Migration history
//!
//! The history table records which migrations have been applied to a
//! database. It is the version-tracking source of truth for the applier.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::db::connection::DatabaseConnection;
use crate::db::executor::UnitOfWork;
use crate::error::Result;
use crate::schema::types::{ColumnType, Dialect};

/// A row of the history table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub name: String,
    pub checksum: Option<String>,
    pub applied_at: NaiveDateTime,
}

/// Ensure the migration history table exists
pub async fn ensure_table(connection: &DatabaseConnection, table_name: &str) -> Result<()> {
    connection
        .execute(&create_table_sql(connection.dialect(), table_name))
        .await?;
    Ok(())
}

fn create_table_sql(dialect: Dialect, table_name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            migration_id VARCHAR(150) NOT NULL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            checksum VARCHAR(64) NULL,
            applied_at {} NOT NULL
        )",
        dialect.quote_ident(table_name),
        dialect.column_type(ColumnType::Timestamp)
    )
}

/// List applied migrations in version order
pub async fn applied(
    connection: &DatabaseConnection,
    table_name: &str,
) -> Result<Vec<AppliedMigration>> {
    let sql = format!(
        "SELECT migration_id, name, checksum, applied_at FROM {} ORDER BY migration_id",
        connection.dialect().quote_ident(table_name)
    );

    type Row = (String, String, Option<String>, NaiveDateTime);
    let rows: Vec<Row> = match connection {
        DatabaseConnection::Postgres(pool) => sqlx::query_as(&sql).fetch_all(pool).await?,
        DatabaseConnection::MySql(pool) => sqlx::query_as(&sql).fetch_all(pool).await?,
        DatabaseConnection::Sqlite(pool) => sqlx::query_as(&sql).fetch_all(pool).await?,
    };

    Ok(rows
        .into_iter()
        .map(|(migration_id, name, checksum, applied_at)| AppliedMigration {
            migration_id,
            name,
            checksum,
            applied_at,
        })
        .collect())
}

/// Record a migration in the history table
pub async fn record(
    unit: &mut UnitOfWork,
    table_name: &str,
    migration_id: &str,
    name: &str,
    checksum: &str,
) -> Result<()> {
    let dialect = unit.dialect();
    let applied_at = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
    let sql = format!(
        "INSERT INTO {} (migration_id, name, checksum, applied_at) VALUES ({}, {}, {}, {})",
        dialect.quote_ident(table_name),
        dialect.quote_literal(migration_id),
        dialect.quote_literal(name),
        dialect.quote_literal(checksum),
        dialect.quote_literal(&applied_at)
    );

    unit.execute(&sql).await?;
    Ok(())
}

/// Remove a migration from the history table
pub async fn remove(unit: &mut UnitOfWork, table_name: &str, migration_id: &str) -> Result<()> {
    let dialect = unit.dialect();
    let sql = format!(
        "DELETE FROM {} WHERE migration_id = {}",
        dialect.quote_ident(table_name),
        dialect.quote_literal(migration_id)
    );

    unit.execute(&sql).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_table_uses_dialect_types() {
        let sql = create_table_sql(Dialect::MySql, "__schema_history");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS `__schema_history`"));
        assert!(sql.contains("applied_at DATETIME(6) NOT NULL"));

        let sql = create_table_sql(Dialect::Postgres, "__schema_history");
        assert!(sql.contains("\"__schema_history\""));
        assert!(sql.contains("applied_at TIMESTAMP NOT NULL"));
    }
}
