//! E2E tests for account flows: register, login, lookup.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use account_test_utils::{
    test_config, test_config_without_token, ErrorBodyAssertions, TestAccountServer,
    TEST_LOGIN_TOKEN, TEST_PASSWORD,
};
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Registration Tests
// ============================================================================

/// A new username registers and the response carries only id and username.
#[tokio::test]
async fn test_register_happy_path() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAccountServer::spawn(test_config()).await?;

    // Act
    let response = server
        .client()
        .post(format!("{}/register", server.url()))
        .json(&json!({
            "username": "alice",
            "password": TEST_PASSWORD,
            "email": "alice@example.com"
        }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = response.json().await?;
    assert!(body["id"].as_i64().is_some(), "Response should include id");
    assert_eq!(body["username"], "alice");
    body.assert_never_mentions(TEST_PASSWORD)
        .assert_never_mentions("argon2");

    Ok(())
}

/// The stored digest is an Argon2id PHC string, never the password.
#[tokio::test]
async fn test_register_stores_salted_digest() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server.register("alice", TEST_PASSWORD).await?;
    server.register("bob", TEST_PASSWORD).await?;

    let digests: Vec<(String,)> =
        sqlx::query_as("SELECT credential_digest FROM accounts ORDER BY id")
            .fetch_all(server.pool())
            .await?;

    assert_eq!(digests.len(), 2);
    for (digest,) in &digests {
        assert!(digest.starts_with("$argon2id$"), "got {}", digest);
        assert!(!digest.contains(TEST_PASSWORD));
    }
    assert_ne!(digests[0].0, digests[1].0, "Same password must not share a digest");

    Ok(())
}

/// A second registration for the same username is a 409 and stores nothing.
#[tokio::test]
async fn test_register_duplicate_username_returns_409() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let first = server.register("alice", "first-password").await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = server.register("alice", "second-password").await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = second.json().await?;
    body.assert_error_code("USERNAME_TAKEN");

    // The original password still works and the second never took effect
    assert_eq!(
        server.login("alice", "first-password").await?.status(),
        StatusCode::OK
    );
    assert_eq!(
        server.login("alice", "second-password").await?.status(),
        StatusCode::UNAUTHORIZED
    );

    Ok(())
}

/// Empty usernames and empty passwords are rejected before hashing.
#[tokio::test]
async fn test_register_empty_fields_returns_400() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.register("", TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    body.assert_error_code("INVALID_REQUEST");

    let response = server.register("carol", "").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

/// Concurrent registrations of one username produce exactly one account.
#[tokio::test]
async fn test_register_concurrent_same_username_single_winner() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let attempts = (0..10).map(|i| {
        let password = format!("password-{}", i);
        let server = &server;
        async move { server.register("contested", &password).await }
    });

    let statuses: Vec<StatusCode> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.map(|response| response.status()))
        .collect::<Result<_, _>>()?;

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(created, 1, "statuses: {:?}", statuses);
    assert_eq!(conflicts, 9, "statuses: {:?}", statuses);

    let (rows,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE username = 'contested'")
            .fetch_one(server.pool())
            .await?;
    assert_eq!(rows, 1);

    Ok(())
}

// ============================================================================
// Login Tests
// ============================================================================

/// Correct credentials return the summary and the configured token.
#[tokio::test]
async fn test_login_happy_path_returns_configured_token() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    let created: serde_json::Value = server.register("alice", TEST_PASSWORD).await?.json().await?;

    let response = server.login("alice", TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["id"], created["id"]);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["token"], TEST_LOGIN_TOKEN);

    Ok(())
}

/// Without a configured token the field is absent, not a placeholder.
#[tokio::test]
async fn test_login_without_configured_token_omits_token() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config_without_token()).await?;
    server.register("alice", TEST_PASSWORD).await?;

    let body: serde_json::Value = server.login("alice", TEST_PASSWORD).await?.json().await?;
    assert!(body.get("token").is_none(), "body: {}", body);

    Ok(())
}

/// Unknown user and wrong password are indistinguishable on the wire.
#[tokio::test]
async fn test_login_unknown_user_and_wrong_password_identical() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server.register("realuser", "rightpass").await?;

    let ghost = server.login("ghost", "anything").await?;
    let wrong = server.login("realuser", "wrongpass").await?;

    assert_eq!(ghost.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ghost_body = ghost.bytes().await?;
    let wrong_body = wrong.bytes().await?;
    assert_eq!(ghost_body, wrong_body);

    let body: serde_json::Value = serde_json::from_slice(&ghost_body)?;
    body.assert_error_code("INVALID_CREDENTIALS")
        .assert_never_mentions(TEST_LOGIN_TOKEN);

    Ok(())
}

/// Classic injection payloads in the username never authenticate.
#[tokio::test]
async fn test_login_injection_username_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server.register("admin", TEST_PASSWORD).await?;

    for username in ["admin' --", "' OR '1'='1", "admin'; DROP TABLE accounts; --"] {
        let response = server.login(username, "irrelevant").await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", username);
    }

    // Table is intact
    assert_eq!(
        server.login("admin", TEST_PASSWORD).await?.status(),
        StatusCode::OK
    );

    Ok(())
}

/// A body that is not the expected JSON is rejected by the framework.
#[tokio::test]
async fn test_login_malformed_body_rejected() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server
        .client()
        .post(format!("{}/login", server.url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;

    assert!(response.status().is_client_error());

    Ok(())
}

// ============================================================================
// Lookup Tests
// ============================================================================

/// Lookup returns the public view with email and no digest.
#[tokio::test]
async fn test_lookup_returns_public_view() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server
        .client()
        .post(format!("{}/register", server.url()))
        .json(&json!({"username": "alice", "password": TEST_PASSWORD, "email": "a@example.com"}))
        .send()
        .await?;

    let response = server.lookup("alice").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@example.com");
    assert!(body["user"].get("credential_digest").is_none());
    body.assert_never_mentions("argon2");

    Ok(())
}

/// Unknown usernames, including injection payloads, are 404.
#[tokio::test]
async fn test_lookup_unknown_or_injected_returns_404() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server.register("alice", TEST_PASSWORD).await?;

    for username in ["nobody", "' OR '1'='1", "alice' --", "alice\"; --", "%"] {
        let response = server.lookup(username).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{:?}", username);

        let body: serde_json::Value = response.json().await?;
        body.assert_error_code("NOT_FOUND");
    }

    Ok(())
}

/// Usernames with quotes and semicolons round-trip as data.
#[tokio::test]
async fn test_lookup_unusual_username_matches_exactly() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    let username = "o'brien; \"quoted\"";

    let response = server.register(username, TEST_PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = server.lookup(username).await?.json().await?;
    assert_eq!(body["user"]["username"], username);

    Ok(())
}
