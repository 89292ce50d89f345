use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};

/// Applies the embedded schema, including the seeded cost categories.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply database migrations")?;
    Ok(())
}
