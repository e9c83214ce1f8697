//! E2E tests for the outbound fetch proxy.
//!
//! Upstreams are wiremock servers on 127.0.0.1, which the test policy both
//! allowlists and exempts from the private-address check. Everything else
//! is rejected before a socket is opened.

use account_test_utils::{
    default_fetch_policy, loopback_fetch_policy, test_config, test_config_with_policy,
    ErrorBodyAssertions, TestAccountServer,
};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Admission Tests
// ============================================================================

/// Non-web schemes are refused even for an allowlisted host.
#[tokio::test]
async fn test_fetch_ftp_scheme_returns_403() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.fetch("ftp://api.example.com/x").await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body: serde_json::Value = response.json().await?;
    body.assert_error_code("NOT_ALLOWED");

    Ok(())
}

/// Hosts outside the allowlist, including lookalikes, are refused.
#[tokio::test]
async fn test_fetch_unlisted_hosts_return_403() -> Result<(), anyhow::Error> {
    let server =
        TestAccountServer::spawn(test_config_with_policy(default_fetch_policy())).await?;

    for target in [
        "https://evil.com/",
        "https://api.example.com.evil.com/",
        "https://evil.com/?api.example.com",
        "https://api.example.com@evil.com/",
        "http://169.254.169.254/latest/meta-data/",
        "http://localhost:8000/health",
    ] {
        let response = server.fetch(target).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", target);
    }

    Ok(())
}

/// Unparseable input is a 400, not a 403.
#[tokio::test]
async fn test_fetch_malformed_url_returns_400() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.fetch("not a url at all").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await?;
    body.assert_error_code("MALFORMED_URL");

    Ok(())
}

/// Missing `url` query parameter is rejected by the framework.
#[tokio::test]
async fn test_fetch_missing_query_parameter_rejected() -> Result<(), anyhow::Error> {
    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server
        .client()
        .get(format!("{}/fetch", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

/// Loopback is refused when the policy allowlists it without an exemption.
#[tokio::test]
async fn test_fetch_private_address_without_exemption_returns_403() -> Result<(), anyhow::Error>
{
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("internal"))
        .expect(0)
        .mount(&upstream)
        .await;

    let policy = account_service::config::FetchPolicy::new(
        &["127.0.0.1"],
        &["http"],
        &[],
        Duration::from_secs(2),
        200,
    )?;
    let server = TestAccountServer::spawn(test_config_with_policy(policy)).await?;

    let response = server.fetch(&upstream.uri()).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    Ok(())
}

// ============================================================================
// Execution Tests
// ============================================================================

/// An admitted URL is fetched once and the body prefix is relayed.
#[tokio::test]
async fn test_fetch_allowed_upstream_returns_content() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.fetch(&format!("{}/data", upstream.uri())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["content"], "{\"ok\":true}");
    assert_eq!(body["status_code"], 200);
    assert_eq!(body["truncated"], false);

    Ok(())
}

/// Bodies longer than the cap come back cut to exactly the cap.
#[tokio::test]
async fn test_fetch_oversized_body_truncated() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("z".repeat(5_000)))
        .mount(&upstream)
        .await;

    let server = TestAccountServer::spawn(test_config()).await?;

    let body: serde_json::Value = server.fetch(&upstream.uri()).await?.json().await?;
    assert_eq!(body["content"].as_str().map(str::len), Some(200));
    assert_eq!(body["truncated"], true);

    Ok(())
}

/// An upstream that never answers becomes a 504 within the bound.
#[tokio::test]
async fn test_fetch_unresponsive_upstream_returns_504() -> Result<(), anyhow::Error> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&upstream)
        .await;

    let policy = loopback_fetch_policy(Duration::from_millis(300), 200);
    let server = TestAccountServer::spawn(test_config_with_policy(policy)).await?;

    let start = Instant::now();
    let response = server.fetch(&upstream.uri()).await?;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "Timeout should fire near the configured bound, took {:?}",
        start.elapsed()
    );

    let body: serde_json::Value = response.json().await?;
    body.assert_error_code("TIMEOUT");

    Ok(())
}

/// Redirects are relayed as-is, never followed.
#[tokio::test]
async fn test_fetch_redirect_not_followed() -> Result<(), anyhow::Error> {
    let internal = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("internal secret"))
        .expect(0)
        .mount(&internal)
        .await;

    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", internal.uri().as_str()),
        )
        .mount(&upstream)
        .await;

    let server = TestAccountServer::spawn(test_config()).await?;

    let body: serde_json::Value = server.fetch(&upstream.uri()).await?.json().await?;
    assert_eq!(body["status_code"], 302);
    body.assert_never_mentions("internal secret");

    Ok(())
}

/// A refused connection is a 502 whose body hides the transport error.
#[tokio::test]
async fn test_fetch_connection_refused_returns_502() -> Result<(), anyhow::Error> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let server = TestAccountServer::spawn(test_config()).await?;

    let response = server.fetch(&format!("http://127.0.0.1:{}/", port)).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = response.json().await?;
    body.assert_error_code("TRANSPORT_FAILURE")
        .assert_message_excludes("refused");

    Ok(())
}
