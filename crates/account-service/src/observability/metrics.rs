//! Metrics definitions for the account service
//!
//! All metrics follow Prometheus naming conventions:
//! - `account_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: register, authenticate, lookup (plus hash/verify, select/insert)
//! - `status`: success, error
//! - `outcome`: fetch terminal states (completed, rejected_*, failed_*)
//! - `path`: normalized route templates, never raw usernames

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("account_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Coarse buckets: hash timings should not leak much detail
        .set_buckets_for_metric(
            Matcher::Prefix("account_credential_hash".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set credential hash buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("account_fetch".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000],
        )
        .map_err(|e| format!("Failed to set fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("account_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Account Operation Metrics
// ============================================================================

/// Record an account operation outcome
///
/// Metric: `account_operations_total`, `account_operation_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_account_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("account_operation_duration_seconds", "operation" => operation.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("account_operations_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record credential hasher duration
///
/// Metric: `account_credential_hash_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_hash_duration(operation: &str, duration: Duration) {
    histogram!("account_credential_hash_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Outbound Fetch Metrics
// ============================================================================

/// Record a fetch terminal state
///
/// Metric: `account_fetch_total`, `account_fetch_duration_seconds`
/// Labels: `outcome`
pub fn record_fetch(outcome: &str, duration: Duration) {
    histogram!("account_fetch_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());

    counter!("account_fetch_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `account_db_query_duration_seconds`, `account_db_queries_total`
/// Labels: `operation`, `table`, `status`
pub fn record_db_query(operation: &str, table: &str, status: &str, duration: Duration) {
    histogram!("account_db_query_duration_seconds", "operation" => operation.to_string(), "table" => table.to_string())
        .record(duration.as_secs_f64());

    counter!("account_db_queries_total", "operation" => operation.to_string(), "table" => table.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a transient storage retry
///
/// Metric: `account_db_retries_total`
/// Labels: `operation`
pub fn record_db_retry(operation: &str) {
    counter!("account_db_retries_total", "operation" => operation.to_string()).increment(1);
}

// ============================================================================
// Error / HTTP Metrics
// ============================================================================

/// Record an error response
///
/// Metric: `account_errors_total`
/// Labels: `error_category`, `status_code`
pub fn record_error(error_category: &str, status_code: u16) {
    counter!("account_errors_total",
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record an HTTP request
///
/// Metric: `account_http_requests_total`, `account_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    histogram!("account_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("account_http_requests_total",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Normalize path to prevent label cardinality explosion
///
/// Usernames in `/users/{username}` are user-controlled and must never become
/// label values.
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/metrics" | "/register" | "/login" | "/fetch" => path.to_string(),
        _ if path.starts_with("/users/") => "/users/{username}".to_string(),
        _ => "/other".to_string(),
    }
}
