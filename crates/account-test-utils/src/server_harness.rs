//! Test server harness for E2E testing
//!
//! Provides TestAccountServer for spawning real account service instances in
//! tests.

use account_service::config::Config;
use account_service::db;
use account_service::observability::metrics::init_metrics_recorder;
use account_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::Response;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Test harness for spawning the account service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_register_e2e() -> Result<()> {
///     let server = TestAccountServer::spawn(test_config()).await?;
///
///     let response = server
///         .client()
///         .post(format!("{}/register", server.url()))
///         .json(&serde_json::json!({"username": "alice", "password": "pw"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     Ok(())
/// }
/// ```
pub struct TestAccountServer {
    addr: SocketAddr,
    pool: SqlitePool,
    config: Config,
    client: reqwest::Client,
    // Keeps the database file alive for the server's lifetime
    _db_dir: Option<TempDir>,
    _handle: JoinHandle<()>,
}

impl TestAccountServer {
    /// Spawn a new test server backed by a fresh SQLite file
    ///
    /// The server will:
    /// - Create and migrate a database in a temporary directory
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// `config.database_url` is ignored.
    pub async fn spawn(config: Config) -> Result<Self, anyhow::Error> {
        let db_dir = tempfile::tempdir()
            .map_err(|e| anyhow::anyhow!("Failed to create database dir: {}", e))?;
        let database_url = format!("sqlite://{}", db_dir.path().join("accounts.db").display());

        let pool = db::connect(&database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open test database: {}", e))?;

        let config = Config {
            database_url,
            ..config
        };

        Self::start(pool, config, Some(db_dir)).await
    }

    /// Spawn a test server on an existing pool
    pub async fn spawn_with_pool(pool: SqlitePool, config: Config) -> Result<Self, anyhow::Error> {
        Self::start(pool, config, None).await
    }

    async fn start(
        pool: SqlitePool,
        config: Config,
        db_dir: Option<TempDir>,
    ) -> Result<Self, anyhow::Error> {
        let state = Arc::new(
            AppState::new(pool.clone(), config.clone())
                .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        // Only the first server in a test process can install the global
        // recorder; later ones get a standalone handle.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => PrometheusBuilder::new().build_recorder().handle(),
        };

        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build test client: {}", e))?;

        Ok(Self {
            addr,
            pool,
            config,
            client,
            _db_dir: db_dir,
            _handle: handle,
        })
    }

    /// Get reference to the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// HTTP client for talking to this server
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// POST /register with no email
    pub async fn register(&self, username: &str, password: &str) -> Result<Response, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/register", self.url()))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await?;
        Ok(response)
    }

    /// POST /login
    pub async fn login(&self, username: &str, password: &str) -> Result<Response, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/login", self.url()))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await?;
        Ok(response)
    }

    /// GET /users/{username}, percent-encoding the username
    pub async fn lookup(&self, username: &str) -> Result<Response, anyhow::Error> {
        let mut url = reqwest::Url::parse(&self.url())?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Server URL cannot be a base"))?
            .pop_if_empty()
            .push("users")
            .push(username);

        Ok(self.client.get(url).send().await?)
    }

    /// GET /fetch?url=...
    pub async fn fetch(&self, target: &str) -> Result<Response, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/fetch", self.url()))
            .query(&[("url", target)])
            .send()
            .await?;
        Ok(response)
    }
}

impl Drop for TestAccountServer {
    fn drop(&mut self) {
        // Stop the server task when the test completes
        self._handle.abort();
    }
}
