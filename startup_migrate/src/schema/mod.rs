//! Schema module for startup_migrate
//!
//! This module handles schema-change definitions, SQL generation, applying
//! migrations and reading the resulting schema back.

pub mod analyzer;
pub mod generator;
pub mod migration;
pub mod types;

// Re-export key types
pub use analyzer::SchemaAnalyzer;
pub use generator::MigrationGenerator;
pub use migration::{
    synchronize, Migration, MigrationSet, MigrationStatus, Migrator, SchemaChange, SchemaManager,
    SyncReport,
};
pub use types::{Column, ColumnType, DatabaseSchema, Dialect, Index, PrimaryKey, Table};
