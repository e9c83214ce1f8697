//! Database connection management.

use crate::errors::AccountError;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Embedded schema migrations (`crates/account-service/migrations`).
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a connection waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if missing) the SQLite database at `database_url` and run
/// pending migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AccountError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AccountError::Database(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("synchronous", "NORMAL");

    let pool = SqlitePoolOptions::new()
        // Single writer, concurrent readers under WAL
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| AccountError::Database(format!("Failed to connect to database: {}", e)))?;

    debug!("Database connection established");

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Open an in-memory database (for testing).
///
/// In-memory databases are per-connection, so the pool holds exactly one
/// connection that is never recycled.
pub async fn connect_in_memory() -> Result<SqlitePool, AccountError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AccountError::Database(format!("Invalid database URL: {}", e)))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AccountError::Database(format!("Failed to open in-memory database: {}", e)))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), AccountError> {
    debug!("Running database migrations");
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| AccountError::Database(format!("Migration failed: {}", e)))?;
    info!("Database migrations complete");
    Ok(())
}

/// Check that the database answers a trivial query.
pub async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
