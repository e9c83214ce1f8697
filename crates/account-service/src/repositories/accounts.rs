//! Account repository: the user directory store.
//!
//! Every statement here is static SQL with bound parameters. Caller-supplied
//! values (usernames in particular) are only ever passed through `.bind()`,
//! so their content cannot change which rows a statement touches.

use crate::errors::AccountError;
use crate::observability::metrics::{record_db_query, record_db_retry};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

const TABLE: &str = "accounts";

/// Attempts for a statement that hits `SQLITE_BUSY` / `SQLITE_LOCKED`.
const MAX_TRANSIENT_ATTEMPTS: u32 = 3;
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(25);

/// Account model (maps to accounts table)
#[derive(Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub credential_digest: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Redacts `credential_digest`.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("credential_digest", &"[REDACTED]")
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Create an account.
///
/// The `UNIQUE (username)` constraint makes the uniqueness check and the write
/// a single statement: of two concurrent inserts for one username exactly one
/// succeeds and the other gets `AccountError::UsernameTaken`. No row is
/// written on failure.
pub async fn insert(
    pool: &SqlitePool,
    username: &str,
    credential_digest: &str,
    email: Option<&str>,
) -> Result<Account, AccountError> {
    let start = Instant::now();
    let created_at = Utc::now();

    let result = retry_transient("insert", || {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, credential_digest, email, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, username, credential_digest, email, created_at
            "#,
        )
        .bind(username)
        .bind(credential_digest)
        .bind(email)
        .bind(created_at)
        .fetch_one(pool)
    })
    .await;

    match result {
        Ok(account) => {
            record_db_query("insert", TABLE, "success", start.elapsed());
            Ok(account)
        }
        Err(e) if is_unique_violation(&e) => {
            record_db_query("insert", TABLE, "conflict", start.elapsed());
            Err(AccountError::UsernameTaken)
        }
        Err(e) => {
            record_db_query("insert", TABLE, "error", start.elapsed());
            Err(AccountError::Database(format!(
                "Failed to insert account: {}",
                e
            )))
        }
    }
}

/// Get account by exact username.
pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Account>, AccountError> {
    let start = Instant::now();

    let result = retry_transient("select", || {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, credential_digest, email, created_at
            FROM accounts
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
    })
    .await;

    finish_select(result, start, "Failed to fetch account by username")
}

/// Get account by id.
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Account>, AccountError> {
    let start = Instant::now();

    let result = retry_transient("select", || {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, credential_digest, email, created_at
            FROM accounts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await;

    finish_select(result, start, "Failed to fetch account by id")
}

fn finish_select(
    result: Result<Option<Account>, sqlx::Error>,
    start: Instant,
    context: &str,
) -> Result<Option<Account>, AccountError> {
    match result {
        Ok(account) => {
            record_db_query("select", TABLE, "success", start.elapsed());
            Ok(account)
        }
        Err(e) => {
            record_db_query("select", TABLE, "error", start.elapsed());
            Err(AccountError::Database(format!("{}: {}", context, e)))
        }
    }
}

/// Re-run `op` while SQLite reports transient lock contention.
///
/// Anything else, including the final transient failure, is returned as is.
async fn retry_transient<T, F, Fut>(operation: &str, mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < MAX_TRANSIENT_ATTEMPTS && is_transient(&e) => {
                tracing::debug!(
                    target: "account.repositories.accounts",
                    operation,
                    attempt,
                    "Transient storage contention, retrying"
                );
                record_db_retry(operation);
                tokio::time::sleep(TRANSIENT_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
        ),
        _ => false,
    }
}
