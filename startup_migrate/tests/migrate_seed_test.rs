//! Schema synchronization and seeding against throwaway SQLite databases

mod common;

use std::str::FromStr;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::{tempdir, TempDir};

use common::{sqlite_config, sqlite_connection, HISTORY_TABLE};
use startup_migrate::DatabaseConnection;
use startup_migrate::db::history;
use startup_migrate::models::{event_log, order, EventLogEntry, LogicalDatabase, Order};
use startup_migrate::schema::migration::{
    synchronize, Migration, MigrationSet, Migrator, SchemaChange, SchemaManager,
};
use startup_migrate::schema::types::{Column, ColumnType, Index};
use startup_migrate::seed::{seed_with_retry, OrdersSeed, SeedOutcome, Seeder};
use startup_migrate::{RetryPolicy, SchemaAnalyzer};

fn orders_migrator() -> Migrator {
    Migrator::new(order::migrations().unwrap(), HISTORY_TABLE)
}

#[tokio::test]
async fn synchronizing_twice_leaves_schema_identical() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "orders.db").await;
    let migrator = orders_migrator();

    let first = synchronize(&migrator, "orders", &conn).await.unwrap();
    assert_eq!(first.applied, vec!["20180209223655_Init".to_string()]);
    assert_eq!(first.skipped, 0);
    let after_first = SchemaAnalyzer::new(&conn).analyze().await.unwrap();

    let second = synchronize(&migrator, "orders", &conn).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(second.skipped, 1);
    let after_second = SchemaAnalyzer::new(&conn).analyze().await.unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(
        after_second.column_names("Orders"),
        vec!["Id", "OrderDate", "Description"]
    );
    assert!(after_second.has_table(HISTORY_TABLE));

    let applied = history::applied(&conn, HISTORY_TABLE).await.unwrap();
    assert_eq!(applied.len(), 1);
    conn.close().await;
}

#[tokio::test]
async fn event_log_schema_accepts_entries() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "events.db").await;
    let migrator = Migrator::new(event_log::migrations().unwrap(), HISTORY_TABLE);

    migrator.apply_pending_migrations(&conn).await.unwrap();

    let schema = SchemaAnalyzer::new(&conn).analyze().await.unwrap();
    assert_eq!(schema.column_names("EventLog"), vec!["EventId", "Content", "Name"]);
    assert!(schema.tables["EventLog"].columns.iter().all(|c| !c.nullable));

    let dialect = conn.dialect();
    let entry = EventLogEntry::new("OrderStarted", "{\"orderId\":1}");
    conn.execute(&entry.insert_sql(dialect)).await.unwrap();
    // Same primary key twice is a permanent failure
    let err = conn.execute(&entry.insert_sql(dialect)).await.unwrap_err();
    assert!(!err.is_transient());

    let count = conn
        .fetch_count("SELECT COUNT(*) FROM \"EventLog\"")
        .await
        .unwrap();
    assert_eq!(count, 1);
    conn.close().await;
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "orders.db").await;
    orders_migrator().apply_pending_migrations(&conn).await.unwrap();

    assert_eq!(OrdersSeed.seed(&conn).await.unwrap(), SeedOutcome::Inserted(1));
    assert_eq!(OrdersSeed.seed(&conn).await.unwrap(), SeedOutcome::AlreadySeeded);

    let count = conn.fetch_count(&Order::count_sql(conn.dialect())).await.unwrap();
    assert_eq!(count, 1);
    conn.close().await;
}

#[tokio::test]
async fn seeding_leaves_existing_rows_alone() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "orders.db").await;
    orders_migrator().apply_pending_migrations(&conn).await.unwrap();

    let mut existing = Order::default_seed();
    existing.description = "Imported".to_string();
    conn.execute(&existing.insert_sql(conn.dialect())).await.unwrap();
    conn.execute(&existing.insert_sql(conn.dialect())).await.unwrap();

    let outcome = seed_with_retry(&OrdersSeed, &conn, &RetryPolicy::none())
        .await
        .unwrap();
    assert_eq!(outcome, SeedOutcome::AlreadySeeded);

    let count = conn.fetch_count(&Order::count_sql(conn.dialect())).await.unwrap();
    assert_eq!(count, 2);
    conn.close().await;
}

async fn impatient_connection(dir: &TempDir, file: &str) -> DatabaseConnection {
    let options = SqliteConnectOptions::from_str(&sqlite_config(dir, file).url)
        .unwrap()
        .busy_timeout(Duration::from_millis(50));
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    DatabaseConnection::Sqlite(pool)
}

#[tokio::test]
async fn lock_contention_is_transient() {
    let dir = tempdir().unwrap();
    let holder = impatient_connection(&dir, "orders.db").await;
    let contender = impatient_connection(&dir, "orders.db").await;
    orders_migrator().apply_pending_migrations(&holder).await.unwrap();

    let dialect = holder.dialect();
    let mut unit = holder.begin().await.unwrap();
    unit.execute(&Order::default_seed().insert_sql(dialect)).await.unwrap();

    let err = contender
        .execute(&Order::default_seed().insert_sql(dialect))
        .await
        .unwrap_err();
    assert!(err.is_transient(), "expected a transient error, got {}", err);
    assert!(err.to_string().contains("database is locked"));

    // Once the writer is done the same insert goes through
    unit.commit().await.unwrap();
    contender
        .execute(&Order::default_seed().insert_sql(dialect))
        .await
        .unwrap();
    let count = holder.fetch_count(&Order::count_sql(dialect)).await.unwrap();
    assert_eq!(count, 2);

    holder.close().await;
    contender.close().await;
}

#[tokio::test]
async fn seeding_before_migration_fails_permanently() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "orders.db").await;

    let err = OrdersSeed.seed(&conn).await.unwrap_err();
    assert!(!err.is_transient());
    conn.close().await;
}

#[tokio::test]
async fn later_migrations_are_applied_in_version_order() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "orders.db").await;
    orders_migrator().apply_pending_migrations(&conn).await.unwrap();

    let mut migrations: Vec<Migration> = order::migrations().unwrap().iter().cloned().collect();
    migrations.push(
        Migration::new("20190101000000_AddStatus", "AddStatus")
            .up(SchemaChange::AddColumn {
                table: "Orders".to_string(),
                column: Column::new("Status", ColumnType::Text).default("'new'"),
            })
            .down(SchemaChange::DropColumn {
                table: "Orders".to_string(),
                column: "Status".to_string(),
            }),
    );
    migrations.push(
        Migration::new("20180301000000_IndexOrderDate", "IndexOrderDate")
            .up(SchemaChange::CreateIndex {
                table: "Orders".to_string(),
                index: Index::on(&["OrderDate"]),
            })
            .down(SchemaChange::DropIndex {
                table: "Orders".to_string(),
                name: "IX_Orders_OrderDate".to_string(),
            }),
    );
    let migrator = Migrator::new(MigrationSet::new(migrations).unwrap(), HISTORY_TABLE);

    let report = migrator.apply_pending_migrations(&conn).await.unwrap();
    assert_eq!(
        report.applied,
        vec![
            "20180301000000_IndexOrderDate".to_string(),
            "20190101000000_AddStatus".to_string(),
        ]
    );
    assert_eq!(report.skipped, 1);

    let schema = SchemaAnalyzer::new(&conn).analyze().await.unwrap();
    assert_eq!(
        schema.column_names("Orders"),
        vec!["Id", "OrderDate", "Description", "Status"]
    );

    let status = migrator.status(&conn).await.unwrap();
    assert!(status.iter().all(|s| s.applied.is_some()));
    conn.close().await;
}

#[tokio::test]
async fn revert_last_undoes_the_newest_migration() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "events.db").await;
    let migrator = Migrator::new(event_log::migrations().unwrap(), HISTORY_TABLE);
    migrator.apply_pending_migrations(&conn).await.unwrap();

    let reverted = migrator.revert_last(&conn).await.unwrap();
    assert_eq!(reverted.as_deref(), Some("20180209223522_Init"));

    let schema = SchemaAnalyzer::new(&conn).analyze().await.unwrap();
    assert!(!schema.has_table("EventLog"));
    let status = migrator.status(&conn).await.unwrap();
    assert!(status[0].applied.is_none());

    assert_eq!(migrator.revert_last(&conn).await.unwrap(), None);

    // And it comes back on the next start
    let report = migrator.apply_pending_migrations(&conn).await.unwrap();
    assert_eq!(report.applied.len(), 1);
    conn.close().await;
}

#[tokio::test]
async fn failed_migration_is_not_recorded() {
    let dir = tempdir().unwrap();
    let conn = sqlite_connection(&dir, "broken.db").await;
    let migrator = Migrator::new(
        MigrationSet::new(vec![Migration::new("20200101000000_Broken", "Broken")
            .up(SchemaChange::Sql("CREATE TABLE \"Ok\" (\"A\" TEXT)".to_string()))
            .up(SchemaChange::Sql("THIS IS NOT SQL".to_string()))])
        .unwrap(),
        HISTORY_TABLE,
    );

    let err = migrator.apply_pending_migrations(&conn).await.unwrap_err();
    assert!(!err.is_transient());

    let applied = history::applied(&conn, HISTORY_TABLE).await.unwrap();
    assert!(applied.is_empty());
    let schema = SchemaAnalyzer::new(&conn).analyze().await.unwrap();
    assert!(!schema.has_table("Ok"));
    conn.close().await;
}

#[tokio::test]
async fn logical_databases_build_their_migrators() {
    let config = startup_migrate::Config::default();
    let migrator = LogicalDatabase::EventLog.migrator(&config).unwrap();
    assert_eq!(migrator.migrations().len(), 1);
}
