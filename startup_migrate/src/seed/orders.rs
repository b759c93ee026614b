//! Default order for an empty `Orders` table.

use async_trait::async_trait;

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::models::order::Order;
use crate::seed::{SeedOutcome, Seeder};

/// Inserts [`Order::default_seed`] when `Orders` has no rows.
///
/// The count and the insert share one transaction, but two processes
/// starting at once can still both see an empty table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdersSeed;

#[async_trait]
impl Seeder for OrdersSeed {
    fn name(&self) -> &str {
        "OrdersSeed"
    }

    async fn seed(&self, connection: &DatabaseConnection) -> Result<SeedOutcome> {
        let dialect = connection.dialect();
        let mut unit = connection.begin().await?;

        let existing = unit.fetch_count(&Order::count_sql(dialect)).await?;
        if existing > 0 {
            unit.commit().await?;
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let rows = unit.execute(&Order::default_seed().insert_sql(dialect)).await?;
        unit.commit().await?;

        Ok(SeedOutcome::Inserted(rows))
    }
}
