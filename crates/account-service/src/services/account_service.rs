//! Account operations: register, authenticate, lookup, fetch.
//!
//! Usernames reach the logs only through `hash_for_correlation`. Secrets stay
//! in `SecretString` until the moment they are handed to the hasher.

use crate::crypto::CredentialHasher;
use crate::errors::AccountError;
use crate::models::{AccountPublicView, AccountSummary, FetchResult};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_account_operation;
use crate::repositories::accounts;
use crate::services::fetch_gatekeeper::FetchGatekeeper;
use common::secret::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_BYTES: usize = 256;

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub secret: SecretString,
    pub email: Option<String>,
}

/// Create an account.
///
/// # Steps
///
/// 1. Reject empty or over-long usernames and empty secrets
/// 2. Hash the secret on the blocking pool
/// 3. Insert; a duplicate username drops the digest and returns `UsernameTaken`
///
/// Any other character in the username is ordinary data.
#[instrument(skip_all, name = "account.register")]
pub async fn register(
    pool: &SqlitePool,
    hasher: &Arc<CredentialHasher>,
    request: RegistrationRequest,
) -> Result<AccountSummary, AccountError> {
    let start = Instant::now();
    let result = register_inner(pool, hasher, request).await;
    record_account_operation("register", status_label(&result), start.elapsed());
    result
}

async fn register_inner(
    pool: &SqlitePool,
    hasher: &Arc<CredentialHasher>,
    request: RegistrationRequest,
) -> Result<AccountSummary, AccountError> {
    validate_username(&request.username)?;

    if request.secret.expose_secret().is_empty() {
        return Err(AccountError::InvalidRequest(
            "Password cannot be empty".to_string(),
        ));
    }

    let user_hash = hash_for_correlation(&request.username);

    let digest = hash_secret(hasher, request.secret).await?;

    let account = accounts::insert(pool, &request.username, &digest, request.email.as_deref())
        .await
        .inspect_err(|e| {
            if matches!(e, AccountError::UsernameTaken) {
                debug!(target: "account.services.account", user = %user_hash, "Username already taken");
            }
        })?;

    info!(
        target: "account.services.account",
        user = %user_hash,
        account_id = account.id,
        "Account registered"
    );

    Ok(AccountSummary::from(&account))
}

/// Verify a username/secret pair.
///
/// An unknown username and a wrong secret both return
/// `AccountError::InvalidCredentials`, and both pay for a full verification.
#[instrument(skip_all, name = "account.authenticate")]
pub async fn authenticate(
    pool: &SqlitePool,
    hasher: &Arc<CredentialHasher>,
    username: &str,
    secret: &SecretString,
) -> Result<AccountSummary, AccountError> {
    let start = Instant::now();
    let result = authenticate_inner(pool, hasher, username, secret).await;
    record_account_operation("authenticate", status_label(&result), start.elapsed());
    result
}

async fn authenticate_inner(
    pool: &SqlitePool,
    hasher: &Arc<CredentialHasher>,
    username: &str,
    secret: &SecretString,
) -> Result<AccountSummary, AccountError> {
    let user_hash = hash_for_correlation(username);
    let account = accounts::find_by_username(pool, username).await?;

    let hasher = Arc::clone(hasher);
    let secret = secret.clone();

    let Some(account) = account else {
        tokio::task::spawn_blocking(move || hasher.verify_dummy(secret.expose_secret()))
            .await
            .map_err(join_error)?;

        debug!(target: "account.services.account", user = %user_hash, "Authentication failed");
        return Err(AccountError::InvalidCredentials);
    };

    let digest = account.credential_digest.clone();
    let is_valid =
        tokio::task::spawn_blocking(move || hasher.verify(secret.expose_secret(), &digest))
            .await
            .map_err(join_error)?;

    if !is_valid {
        debug!(target: "account.services.account", user = %user_hash, "Authentication failed");
        return Err(AccountError::InvalidCredentials);
    }

    info!(
        target: "account.services.account",
        user = %user_hash,
        account_id = account.id,
        "Authentication succeeded"
    );

    Ok(AccountSummary::from(&account))
}

/// Public view of an account by exact username.
#[instrument(skip_all, name = "account.lookup")]
pub async fn lookup(pool: &SqlitePool, username: &str) -> Result<AccountPublicView, AccountError> {
    let start = Instant::now();

    let result = accounts::find_by_username(pool, username)
        .await
        .and_then(|account| account.map(AccountPublicView::from).ok_or(AccountError::NotFound));

    record_account_operation("lookup", status_label(&result), start.elapsed());
    result
}

/// Admission-checked outbound fetch.
pub async fn fetch(gatekeeper: &FetchGatekeeper, url: &str) -> Result<FetchResult, AccountError> {
    let start = Instant::now();
    let result = gatekeeper.fetch(url).await;
    record_account_operation("fetch", status_label(&result), start.elapsed());
    result
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    if username.is_empty() {
        return Err(AccountError::InvalidRequest(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(AccountError::InvalidRequest(format!(
            "Username must be at most {} bytes",
            MAX_USERNAME_BYTES
        )));
    }
    Ok(())
}

async fn hash_secret(
    hasher: &Arc<CredentialHasher>,
    secret: SecretString,
) -> Result<String, AccountError> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.hash(secret.expose_secret()))
        .await
        .map_err(join_error)?
}

fn join_error(e: tokio::task::JoinError) -> AccountError {
    error!(target: "account.services.account", error = %e, "Hashing task failed");
    AccountError::Internal
}

fn status_label<T>(result: &Result<T, AccountError>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}
