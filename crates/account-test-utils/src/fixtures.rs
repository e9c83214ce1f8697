//! Configuration fixtures.
//!
//! Hashing parameters are the cheapest the hasher accepts so suites stay
//! fast; production defaults are exercised by the config tests instead.

use account_service::config::{Config, FetchPolicy, HashingParams, LogFormat};
use common::secret::SecretString;
use std::time::Duration;

/// Password used by fixtures and harness helpers.
pub const TEST_PASSWORD: &str = "correct-horse-battery-staple";

/// Login token configured by [`test_config`].
pub const TEST_LOGIN_TOKEN: &str = "test-login-token";

/// Cheapest Argon2id parameters the hasher accepts.
pub fn fast_hashing_params() -> HashingParams {
    HashingParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Policy for the production-like allowlist; nothing in it is reachable
/// from tests.
pub fn default_fetch_policy() -> FetchPolicy {
    FetchPolicy::new(
        &["api.example.com", "safe-api.com"],
        &["http", "https"],
        &[],
        Duration::from_secs(2),
        200,
    )
    .expect("default fetch policy should be valid")
}

/// Policy that admits `127.0.0.1`, where wiremock upstreams listen.
pub fn loopback_fetch_policy(timeout: Duration, max_response_bytes: usize) -> FetchPolicy {
    FetchPolicy::new(
        &["127.0.0.1", "api.example.com"],
        &["http", "https"],
        &["127.0.0.1"],
        timeout,
        max_response_bytes,
    )
    .expect("loopback fetch policy should be valid")
}

/// Config with fast hashing, a loopback-capable fetch policy (2s, 200 bytes)
/// and [`TEST_LOGIN_TOKEN`].
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        bind_address: "127.0.0.1:0".to_string(),
        hashing: fast_hashing_params(),
        fetch_policy: loopback_fetch_policy(Duration::from_secs(2), 200),
        login_token: Some(SecretString::from(TEST_LOGIN_TOKEN)),
        log_format: LogFormat::Text,
    }
}

/// [`test_config`] with a different fetch policy.
pub fn test_config_with_policy(fetch_policy: FetchPolicy) -> Config {
    Config {
        fetch_policy,
        ..test_config()
    }
}

/// [`test_config`] without a login token.
pub fn test_config_without_token() -> Config {
    Config {
        login_token: None,
        ..test_config()
    }
}
