//! Integration tests for the service banner, health and metrics endpoints.

use account_test_utils::{test_config, TestAccountServer, TEST_PASSWORD};
use reqwest::StatusCode;

/// `/` identifies the service and reports it running.
#[tokio::test]
async fn test_root_returns_service_banner() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.client().get(server.url()).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "running");
    assert!(body["message"].as_str().is_some());

    Ok(())
}

/// `/health` reports the database and the API version.
#[tokio::test]
async fn test_health_endpoint_returns_healthy() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");
    assert!(
        body["api_version"].as_str().is_some_and(|v| !v.is_empty()),
        "api_version should be present"
    );

    Ok(())
}

/// `/metrics` serves Prometheus text and never leaks usernames as labels.
#[tokio::test]
async fn test_metrics_endpoint_hides_usernames() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;
    server.register("metrics-user-7f3a", TEST_PASSWORD).await?;
    server.lookup("metrics-user-7f3a").await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await?;
    assert!(!body.contains("metrics-user-7f3a"));
    assert!(!body.contains(TEST_PASSWORD));

    Ok(())
}

/// Unknown routes are 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server
        .client()
        .get(format!("{}/admin", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
