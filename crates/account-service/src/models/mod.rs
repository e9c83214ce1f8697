use crate::repositories::accounts::Account;
use common::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Identity returned by register and authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
}

/// Account as shown by lookup. Has no digest field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPublicView {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
        }
    }
}

impl From<Account> for AccountPublicView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
        }
    }
}

/// Outcome of an admitted outbound fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// UTF-8 (lossy) decoding of at most `max_response_bytes` of the body.
    pub body_prefix: String,
    pub status_code: u16,
    /// True when the upstream body was longer than the cap.
    pub truncated: bool,
}

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub email: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: SecretString,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: AccountSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// User lookup response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: AccountPublicView,
}

/// Query string for `/fetch`
#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub url: String,
}

/// Fetch response
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub content: String,
    pub status_code: u16,
    pub truncated: bool,
}

impl From<FetchResult> for FetchResponse {
    fn from(result: FetchResult) -> Self {
        Self {
            content: result.body_prefix,
            status_code: result.status_code,
            truncated: result.truncated,
        }
    }
}

/// Service banner for `/`
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub status: &'static str,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub api_version: &'static str,
    pub database: &'static str,
}
