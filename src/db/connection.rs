//! Database connection management using sqlx

use crate::config::DatabaseSettings;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub type DbPool = PgPool;

/// Initialize the database connection pool.
///
/// Connections are pinged before reuse and recycled after
/// `max_lifetime`; acquisition waits at most `acquire_timeout`.
pub async fn init_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        "Initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .max_lifetime(settings.max_lifetime)
        .test_before_acquire(true)
        .connect(&settings.url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Database pool initialized");
    Ok(pool)
}

/// Close every pooled connection. Waits for checked-out connections to return.
pub async fn close_pool(pool: &PgPool) {
    info!("Closing database connections");
    pool.close().await;
}
