//! Event log database: one append-only table of integration events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::schema::migration::{Migration, MigrationSet, SchemaChange};
use crate::schema::types::{Column, ColumnType, Dialect, Table};

pub const TABLE_NAME: &str = "EventLog";

/// Record in the `EventLog` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub event_id: Uuid,
    pub name: String,
    pub content: String,
}

impl EventLogEntry {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    pub fn insert_sql(&self, dialect: Dialect) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
            dialect.quote_ident(TABLE_NAME),
            dialect.quote_ident("EventId"),
            dialect.quote_ident("Name"),
            dialect.quote_ident("Content"),
            dialect.quote_literal(&self.event_id.to_string()),
            dialect.quote_literal(&self.name),
            dialect.quote_literal(&self.content)
        )
    }
}

pub fn table() -> Table {
    Table::new(TABLE_NAME)
        .column(Column::new("EventId", ColumnType::Uuid))
        .column(Column::new("Content", ColumnType::Text))
        .column(Column::new("Name", ColumnType::Text))
        .primary_key("PK_EventLog", &["EventId"])
}

/// Migrations for the event log database
pub fn migrations() -> Result<MigrationSet> {
    MigrationSet::new(vec![Migration::new("20180209223522_Init", "Init")
        .up(SchemaChange::CreateTable(table()))
        .down(SchemaChange::DropTable(TABLE_NAME.to_string()))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_escapes_literals() {
        let entry = EventLogEntry::new("OrderStarted", "it's json");
        let sql = entry.insert_sql(Dialect::Postgres);
        assert!(sql.starts_with("INSERT INTO \"EventLog\" (\"EventId\", \"Name\", \"Content\")"));
        assert!(sql.contains("'it''s json'"));
        assert!(sql.contains(&entry.event_id.to_string()));
    }

    #[test]
    fn single_init_migration() {
        let set = migrations().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("20180209223522_Init").is_some());
    }
}
