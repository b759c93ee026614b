//! Migration generator
//!
//! This module turns schema-change operations into dialect-specific SQL.

use crate::error::{Error, Result};
use crate::schema::migration::SchemaChange;
use crate::schema::types::{Column, Dialect, Index, Table};
use crate::utils::naming::{get_index_name, truncate_identifier};

const INDEX_NAME_PATTERN: &str = "IX_{table}_{columns}";

/// Migration SQL generator
#[derive(Debug, Clone, Copy)]
pub struct MigrationGenerator {
    dialect: Dialect,
}

impl MigrationGenerator {
    /// Create a new migration generator
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Generate the SQL statements for a list of changes, in order
    pub fn generate_migration_sql(&self, changes: &[SchemaChange]) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for change in changes {
            statements.extend(self.generate_change_sql(change)?);
        }
        Ok(statements)
    }

    fn generate_change_sql(&self, change: &SchemaChange) -> Result<Vec<String>> {
        match change {
            SchemaChange::CreateTable(table) => self.generate_create_table_sql(table),
            SchemaChange::DropTable(name) => Ok(vec![self.generate_drop_table_sql(name)]),
            SchemaChange::AddColumn { table, column } => {
                Ok(vec![self.generate_add_column_sql(table, column)?])
            }
            SchemaChange::DropColumn { table, column } => Ok(vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.ident(table),
                self.ident(column)
            )]),
            SchemaChange::CreateIndex { table, index } => {
                Ok(vec![self.generate_create_index_sql(table, index)])
            }
            SchemaChange::DropIndex { table, name } => {
                Ok(vec![self.generate_drop_index_sql(table, name)])
            }
            SchemaChange::Sql(sql) => Ok(vec![sql.clone()]),
        }
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    /// Generate SQL to create a table and its indexes
    fn generate_create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        if table.columns.is_empty() {
            return Err(Error::MigrationError(format!(
                "Table {} has no columns",
                table.name
            )));
        }

        let mut column_defs = Vec::new();
        let mut inline_primary_key = false;

        for column in &table.columns {
            if column.auto_increment && self.dialect == Dialect::Sqlite {
                // SQLite only generates values for an inline INTEGER PRIMARY KEY
                let single_key = table
                    .primary_key
                    .as_ref()
                    .map_or(false, |pk| pk.columns == [column.name.clone()]);
                if !single_key {
                    return Err(Error::MigrationError(format!(
                        "Auto-increment column {}.{} must be the sole primary key on sqlite",
                        table.name, column.name
                    )));
                }
                inline_primary_key = true;
                column_defs.push(format!(
                    "  {} INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT",
                    self.ident(&column.name)
                ));
                continue;
            }

            column_defs.push(format!("  {}", self.column_definition(column)));
        }

        if let Some(pk) = table.primary_key.as_ref().filter(|_| !inline_primary_key) {
            let columns: Vec<String> = pk.columns.iter().map(|c| self.ident(c)).collect();
            let constraint = match &pk.name {
                Some(name) => format!("CONSTRAINT {} ", self.ident(name)),
                None => String::new(),
            };
            column_defs.push(format!("  {}PRIMARY KEY ({})", constraint, columns.join(", ")));
        }

        // MySQL has no CREATE INDEX IF NOT EXISTS, so its indexes go inline
        // and a rerun after a partial apply finds them with the table
        if self.dialect == Dialect::MySql {
            for index in &table.indexes {
                column_defs.push(format!(
                    "  INDEX {} ({})",
                    self.ident(&self.index_name(&table.name, index)),
                    self.index_columns(index)
                ));
            }
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.ident(&table.name),
            column_defs.join(",\n")
        )];

        if self.dialect != Dialect::MySql {
            for index in &table.indexes {
                statements.push(self.generate_create_index_sql(&table.name, index));
            }
        }

        Ok(statements)
    }

    fn column_definition(&self, column: &Column) -> String {
        let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
        let default = match &column.default {
            Some(default_val) => format!(" DEFAULT {}", default_val),
            None => String::new(),
        };
        let generated = match (self.dialect, column.auto_increment) {
            (Dialect::Postgres, true) => " GENERATED BY DEFAULT AS IDENTITY",
            (Dialect::MySql, true) => " AUTO_INCREMENT",
            _ => "",
        };

        match self.dialect {
            // MySQL wants AUTO_INCREMENT after the nullability
            Dialect::MySql => format!(
                "{} {}{} {}{}",
                self.ident(&column.name),
                self.dialect.column_type(column.column_type),
                default,
                nullable,
                generated
            ),
            _ => format!(
                "{} {}{}{} {}",
                self.ident(&column.name),
                self.dialect.column_type(column.column_type),
                generated,
                default,
                nullable
            ),
        }
    }

    fn generate_drop_table_sql(&self, table_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.ident(table_name))
    }

    fn generate_add_column_sql(&self, table_name: &str, column: &Column) -> Result<String> {
        if column.auto_increment {
            return Err(Error::MigrationError(format!(
                "Cannot add auto-increment column {}.{} to an existing table",
                table_name, column.name
            )));
        }
        if self.dialect == Dialect::Sqlite && !column.nullable && column.default.is_none() {
            return Err(Error::MigrationError(format!(
                "Column {}.{} needs a default to be added as NOT NULL on sqlite",
                table_name, column.name
            )));
        }

        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.ident(table_name),
            self.column_definition(column)
        ))
    }

    /// Name used for an index, generated from its columns when not given
    pub fn index_name(&self, table_name: &str, index: &Index) -> String {
        let name = index
            .name
            .clone()
            .unwrap_or_else(|| get_index_name(INDEX_NAME_PATTERN, table_name, &index.columns));
        truncate_identifier(&name, self.dialect.max_identifier_length())
    }

    fn index_columns(&self, index: &Index) -> String {
        let columns: Vec<String> = index.columns.iter().map(|c| self.ident(c)).collect();
        columns.join(", ")
    }

    fn generate_create_index_sql(&self, table_name: &str, index: &Index) -> String {
        let if_not_exists = match self.dialect {
            Dialect::MySql => "",
            Dialect::Postgres | Dialect::Sqlite => "IF NOT EXISTS ",
        };

        format!(
            "CREATE INDEX {}{} ON {} ({})",
            if_not_exists,
            self.ident(&self.index_name(table_name, index)),
            self.ident(table_name),
            self.index_columns(index)
        )
    }

    fn generate_drop_index_sql(&self, table_name: &str, index_name: &str) -> String {
        match self.dialect {
            Dialect::MySql => format!(
                "DROP INDEX {} ON {}",
                self.ident(index_name),
                self.ident(table_name)
            ),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("DROP INDEX IF EXISTS {}", self.ident(index_name))
            }
        }
    }
}
