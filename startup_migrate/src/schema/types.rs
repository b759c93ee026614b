//! Type definitions for database schema objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SQL dialect of a connected row store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Quote an identifier so mixed-case names survive as written
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Quote a string literal
    pub fn quote_literal(&self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self {
            // MySQL treats backslash as an escape character by default
            Dialect::MySql => format!("'{}'", escaped.replace('\\', "\\\\")),
            Dialect::Postgres | Dialect::Sqlite => format!("'{}'", escaped),
        }
    }

    /// Concrete column type for a logical one
    pub fn column_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (Dialect::Postgres, ColumnType::Uuid) => "UUID",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
            (Dialect::Postgres, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::Timestamp) => "TIMESTAMP",
            (Dialect::MySql, ColumnType::Uuid) => "CHAR(36)",
            (Dialect::MySql, ColumnType::Text) => "LONGTEXT",
            (Dialect::MySql, ColumnType::Integer) => "INT",
            (Dialect::MySql, ColumnType::Timestamp) => "DATETIME(6)",
            (Dialect::Sqlite, ColumnType::Uuid) => "TEXT",
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Timestamp) => "TEXT",
        }
    }

    /// Longest identifier the store accepts
    pub fn max_identifier_length(&self) -> usize {
        match self {
            Dialect::Postgres => 63,
            Dialect::MySql => 64,
            Dialect::Sqlite => 128,
        }
    }
}

/// Logical column types used by migration definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Timestamp,
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
        }
    }

    /// Add a column to the table
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key for the table
    pub fn primary_key(mut self, name: &str, columns: &[&str]) -> Self {
        self.primary_key = Some(PrimaryKey {
            name: Some(name.to_string()),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Add an index to the table
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<String>,
    /// Value generated by the store on insert
    pub auto_increment: bool,
}

impl Column {
    /// Create a new non-null column with the given name and type
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            default: None,
            auto_increment: false,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Represents a primary key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

impl Index {
    pub fn on(columns: &[&str]) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Physical schema as reported by the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSchema {
    pub tables: BTreeMap<String, TableShape>,
}

/// Columns of an existing table, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableShape {
    pub columns: Vec<ColumnShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnShape {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl DatabaseSchema {
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn column_names(&self, table: &str) -> Vec<&str> {
        self.tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }
}
