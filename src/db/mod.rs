//! Database initialization and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! The pool is optional at the application level: when `DATABASE_URL` is
//! unset or the connect fails, the service runs offline against the local
//! snapshot instead, so callers treat a failure here as a downgrade rather
//! than a fatal error.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Connect to Postgres and bring the `pins`/`measurements` schema up to
/// date before any flush can run.
///
/// Pool size comes from `DB_MAX_CONNECTIONS`.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    info!(max_connections, "database pool ready");

    Ok(pool)
}
