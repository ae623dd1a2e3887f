use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Seating schema: charts, tiers, sections, tables and durable seat sales.
pub static MIGRATOR: Migrator = sqlx::migrate!("./src/migrations");

/// Postgres pool holding the seating charts and sold seats.
#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await?;

        info!("Seating database pool ready ({} connections)", config.pool_size);
        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        let pending: Vec<String> = MIGRATOR
            .iter()
            .map(|migration| format!("{} {}", migration.version, migration.description))
            .collect();
        info!("Applying seating schema migrations: {}", pending.join(", "));
        MIGRATOR.run(&self.pool).await?;
        info!("Seating schema is up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seating_schema_is_embedded() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|migration| migration.version).collect();
        assert_eq!(versions, vec![20260101000000]);
        assert!(MIGRATOR.iter().any(|migration| migration.description == "seating"));
    }
}
