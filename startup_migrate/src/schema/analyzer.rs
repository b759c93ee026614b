//! Database schema analyzer
//!
//! This module reads the physical schema back from the store, so callers can
//! check what a synchronization actually produced.

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::schema::types::{ColumnShape, DatabaseSchema};

const POSTGRES_COLUMNS: &str = "
    SELECT table_name::text, column_name::text, data_type::text, is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = current_schema()
    ORDER BY table_name, ordinal_position";

const MYSQL_COLUMNS: &str = "
    SELECT CAST(TABLE_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR),
           CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR)
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE()
    ORDER BY TABLE_NAME, ORDINAL_POSITION";

const SQLITE_COLUMNS: &str = "
    SELECT m.name, p.name, p.type,
           CASE WHEN p.\"notnull\" = 0 THEN 'YES' ELSE 'NO' END
    FROM sqlite_master m
    JOIN pragma_table_info(m.name) p
    WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
    ORDER BY m.name, p.cid";

/// Schema analyzer for database schema introspection
pub struct SchemaAnalyzer<'a> {
    connection: &'a DatabaseConnection,
}

impl<'a> SchemaAnalyzer<'a> {
    /// Create a new schema analyzer
    pub fn new(connection: &'a DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Analyze the current database schema
    pub async fn analyze(&self) -> Result<DatabaseSchema> {
        type Row = (String, String, String, String);
        let rows: Vec<Row> = match self.connection {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query_as(POSTGRES_COLUMNS).fetch_all(pool).await?
            }
            DatabaseConnection::MySql(pool) => sqlx::query_as(MYSQL_COLUMNS).fetch_all(pool).await?,
            DatabaseConnection::Sqlite(pool) => {
                sqlx::query_as(SQLITE_COLUMNS).fetch_all(pool).await?
            }
        };

        let mut schema = DatabaseSchema::default();
        for (table, column, data_type, is_nullable) in rows {
            schema.tables.entry(table).or_default().columns.push(ColumnShape {
                name: column,
                data_type,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
            });
        }

        Ok(schema)
    }
}
