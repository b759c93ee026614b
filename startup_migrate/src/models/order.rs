//! Orders database: one table seeded with a default order.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::migration::{Migration, MigrationSet, SchemaChange};
use crate::schema::types::{Column, ColumnType, Dialect, Table};

pub const TABLE_NAME: &str = "Orders";

/// Record in the `Orders` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Assigned by the store on insert
    pub id: Option<i32>,
    pub order_date: NaiveDateTime,
    pub description: String,
}

impl Order {
    /// The baseline row inserted into an empty table
    pub fn default_seed() -> Self {
        Self {
            id: None,
            order_date: Utc::now().naive_utc(),
            description: "Description".to_string(),
        }
    }

    pub fn insert_sql(&self, dialect: Dialect) -> String {
        let order_date = self.order_date.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            dialect.quote_ident(TABLE_NAME),
            dialect.quote_ident("OrderDate"),
            dialect.quote_ident("Description"),
            dialect.quote_literal(&order_date),
            dialect.quote_literal(&self.description)
        )
    }

    pub fn count_sql(dialect: Dialect) -> String {
        format!("SELECT COUNT(*) FROM {}", dialect.quote_ident(TABLE_NAME))
    }
}

pub fn table() -> Table {
    Table::new(TABLE_NAME)
        .column(Column::new("Id", ColumnType::Integer).auto_increment())
        .column(Column::new("OrderDate", ColumnType::Timestamp))
        .column(Column::new("Description", ColumnType::Text))
        .primary_key("PK_Orders", &["Id"])
}

/// Migrations for the orders database
pub fn migrations() -> Result<MigrationSet> {
    MigrationSet::new(vec![Migration::new("20180209223655_Init", "Init")
        .up(SchemaChange::CreateTable(table()))
        .down(SchemaChange::DropTable(TABLE_NAME.to_string()))])
}
