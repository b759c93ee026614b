//! Migrations and the schema applier
//!
//! A [`Migration`] is an ordered list of [`SchemaChange`]s with a sortable id.
//! The [`Migrator`] applies whatever a database's history table says is
//! still pending, so running it against an up-to-date database does nothing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;

use crate::db::connection::DatabaseConnection;
use crate::db::history::{self, AppliedMigration};
use crate::error::{Error, Result};
use crate::schema::generator::MigrationGenerator;
use crate::schema::types::{Column, Dialect, Index, Table};

/// One schema-change operation
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    CreateTable(Table),
    DropTable(String),
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: String },
    CreateIndex { table: String, index: Index },
    DropIndex { table: String, name: String },
    /// Raw SQL, passed through untouched
    Sql(String),
}

/// A versioned set of schema changes
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// Sortable version id, `YYYYMMDDHHMMSS_Name`
    pub id: String,
    pub name: String,
    pub up: Vec<SchemaChange>,
    pub down: Vec<SchemaChange>,
}

impl Migration {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    pub fn up(mut self, change: SchemaChange) -> Self {
        self.up.push(change);
        self
    }

    pub fn down(mut self, change: SchemaChange) -> Self {
        self.down.push(change);
        self
    }

    /// SQL run when applying the migration
    pub fn up_sql(&self, dialect: Dialect) -> Result<Vec<String>> {
        MigrationGenerator::new(dialect).generate_migration_sql(&self.up)
    }

    /// SQL run when reverting the migration
    pub fn down_sql(&self, dialect: Dialect) -> Result<Vec<String>> {
        MigrationGenerator::new(dialect).generate_migration_sql(&self.down)
    }

    /// md5 of the generated `up` SQL, recorded alongside the applied id
    pub fn checksum(&self, dialect: Dialect) -> Result<String> {
        let sql = self.up_sql(dialect)?.join(";\n");
        Ok(format!("{:x}", md5::compute(sql.as_bytes())))
    }
}

/// Migrations of one logical database, kept in version order
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Build a set, sorting by id and rejecting duplicates
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by(|a, b| a.id.cmp(&b.id));

        let mut seen = HashSet::new();
        for migration in &migrations {
            if migration.id.trim().is_empty() {
                return Err(Error::MigrationError("Migration id must not be empty".to_string()));
            }
            if !seen.insert(migration.id.as_str()) {
                return Err(Error::MigrationError(format!(
                    "Duplicate migration id: {}",
                    migration.id
                )));
            }
        }

        Ok(Self { migrations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.id == id)
    }
}

/// Outcome of one synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Ids applied by this run, in order
    pub applied: Vec<String>,
    /// Migrations that were already applied
    pub skipped: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Known migration and whether the database has it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub id: String,
    pub name: String,
    pub applied: Option<AppliedMigration>,
}

/// Brings a database's schema up to date
#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// Apply every pending migration in version order
    async fn apply_pending_migrations(&self, connection: &DatabaseConnection) -> Result<SyncReport>;
}

/// Applies a [`MigrationSet`] and tracks it in a history table
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: MigrationSet,
    history_table: String,
    transaction_per_migration: bool,
}

impl Migrator {
    pub fn new(migrations: MigrationSet, history_table: &str) -> Self {
        Self {
            migrations,
            history_table: history_table.to_string(),
            transaction_per_migration: true,
        }
    }

    pub fn transaction_per_migration(mut self, enabled: bool) -> Self {
        self.transaction_per_migration = enabled;
        self
    }

    pub fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    /// Every known migration with its applied record, if any
    pub async fn status(&self, connection: &DatabaseConnection) -> Result<Vec<MigrationStatus>> {
        history::ensure_table(connection, &self.history_table).await?;
        let applied: HashMap<String, AppliedMigration> =
            history::applied(connection, &self.history_table)
                .await?
                .into_iter()
                .map(|m| (m.migration_id.clone(), m))
                .collect();

        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                id: m.id.clone(),
                name: m.name.clone(),
                applied: applied.get(&m.id).cloned(),
            })
            .collect())
    }

    /// Revert the most recently applied migration, returning its id
    pub async fn revert_last(&self, connection: &DatabaseConnection) -> Result<Option<String>> {
        history::ensure_table(connection, &self.history_table).await?;
        let applied = history::applied(connection, &self.history_table).await?;

        let Some(last) = applied.last() else {
            tracing::info!("No applied migrations to revert");
            return Ok(None);
        };

        let migration = self.migrations.get(&last.migration_id).ok_or_else(|| {
            Error::MigrationError(format!(
                "Applied migration {} is not known to this build",
                last.migration_id
            ))
        })?;

        let statements = migration.down_sql(connection.dialect())?;
        let mut unit = connection.begin().await?;
        unit.execute_batch(&statements).await?;
        history::remove(&mut unit, &self.history_table, &migration.id).await?;
        unit.commit().await?;

        tracing::info!(migration_id = %migration.id, "Migration reverted");
        Ok(Some(migration.id.clone()))
    }

    async fn apply(&self, connection: &DatabaseConnection, migration: &Migration) -> Result<()> {
        let dialect = connection.dialect();
        let statements = migration.up_sql(dialect)?;
        let checksum = migration.checksum(dialect)?;

        tracing::info!(migration_id = %migration.id, statements = statements.len(), "Applying migration");

        if self.transaction_per_migration {
            let mut unit = connection.begin().await?;
            if let Err(e) = unit.execute_batch(&statements).await {
                if let Err(rollback_error) = unit.rollback().await {
                    tracing::warn!(
                        migration_id = %migration.id,
                        error = %rollback_error,
                        "Rollback after a failed migration did not complete"
                    );
                }
                return Err(e);
            }
            history::record(&mut unit, &self.history_table, &migration.id, &migration.name, &checksum)
                .await?;
            unit.commit().await?;
        } else {
            for statement in &statements {
                connection.execute(statement).await?;
            }
            let mut unit = connection.begin().await?;
            history::record(&mut unit, &self.history_table, &migration.id, &migration.name, &checksum)
                .await?;
            unit.commit().await?;
        }

        tracing::info!(migration_id = %migration.id, "Migration applied successfully");
        Ok(())
    }
}

#[async_trait]
impl SchemaManager for Migrator {
    async fn apply_pending_migrations(&self, connection: &DatabaseConnection) -> Result<SyncReport> {
        let dialect = connection.dialect();
        history::ensure_table(connection, &self.history_table).await?;

        let applied: HashMap<String, AppliedMigration> =
            history::applied(connection, &self.history_table)
                .await?
                .into_iter()
                .map(|m| (m.migration_id.clone(), m))
                .collect();

        let mut report = SyncReport::default();

        for migration in self.migrations.iter() {
            if let Some(record) = applied.get(&migration.id) {
                let expected = migration.checksum(dialect)?;
                if record.checksum.as_deref().map_or(false, |c| c != expected) {
                    tracing::warn!(
                        migration_id = %migration.id,
                        recorded = record.checksum.as_deref().unwrap_or(""),
                        expected = %expected,
                        "Applied migration differs from its current definition"
                    );
                }
                report.skipped += 1;
                continue;
            }

            self.apply(connection, migration).await?;
            report.applied.push(migration.id.clone());
        }

        Ok(report)
    }
}

/// Bring a database's schema up to date through its schema manager
pub async fn synchronize(
    manager: &dyn SchemaManager,
    database: &str,
    connection: &DatabaseConnection,
) -> Result<SyncReport> {
    let report = manager.apply_pending_migrations(connection).await?;

    if report.is_noop() {
        tracing::info!(database, skipped = report.skipped, "Database schema is already up to date");
    } else {
        tracing::info!(
            database,
            applied = report.applied.len(),
            skipped = report.skipped,
            "Database schema synchronized"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ColumnType;

    fn create(id: &str) -> Migration {
        Migration::new(id, "Init")
            .up(SchemaChange::CreateTable(
                Table::new("T").column(Column::new("A", ColumnType::Text)),
            ))
            .down(SchemaChange::DropTable("T".to_string()))
    }

    #[test]
    fn set_sorts_by_version() {
        let set = MigrationSet::new(vec![create("20200101000000_B"), create("20180101000000_A")])
            .unwrap();
        let ids: Vec<&str> = set.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["20180101000000_A", "20200101000000_B"]);
    }

    #[test]
    fn set_rejects_duplicates() {
        let err = MigrationSet::new(vec![create("1_A"), create("1_A")]).unwrap_err();
        assert!(matches!(err, Error::MigrationError(_)));
    }

    #[test]
    fn checksum_depends_on_dialect_and_content() {
        let m = create("1_A");
        assert_eq!(m.checksum(Dialect::Sqlite).unwrap(), m.checksum(Dialect::Sqlite).unwrap());
        assert_ne!(m.checksum(Dialect::Sqlite).unwrap(), m.checksum(Dialect::MySql).unwrap());

        let changed = m.clone().up(SchemaChange::Sql("SELECT 1".to_string()));
        assert_ne!(m.checksum(Dialect::Sqlite).unwrap(), changed.checksum(Dialect::Sqlite).unwrap());
    }
}
