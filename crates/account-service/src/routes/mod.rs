//! HTTP routes for the account service.
//!
//! Defines the Axum router and application state.

use crate::config::{Config, FetchPolicy};
use crate::crypto::CredentialHasher;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::fetch_gatekeeper::FetchGatekeeper;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Lower bound for the request-level timeout.
const REQUEST_TIMEOUT_FLOOR: Duration = Duration::from_secs(30);

/// How much longer a request may run than its outbound fetch.
const FETCH_TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Request-level timeout for a fetch policy, always strictly longer than the
/// policy timeout.
pub fn request_timeout(policy: &FetchPolicy) -> Duration {
    REQUEST_TIMEOUT_FLOOR.max(policy.timeout() + FETCH_TIMEOUT_HEADROOM)
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: SqlitePool,

    /// Service configuration.
    pub config: Config,

    /// Credential hasher, shared with blocking hash tasks.
    pub hasher: Arc<CredentialHasher>,

    /// Admission control for the fetch proxy.
    pub gatekeeper: FetchGatekeeper,
}

impl AppState {
    /// Build state from configuration, deriving the hasher and gatekeeper.
    pub fn new(pool: SqlitePool, config: Config) -> Result<Self, crate::errors::AccountError> {
        let hasher = Arc::new(CredentialHasher::new(config.hashing)?);
        let gatekeeper = FetchGatekeeper::new(Arc::new(config.fetch_policy.clone()));

        Ok(Self {
            pool,
            config,
            hasher,
            gatekeeper,
        })
    }
}

/// Build the application routes.
///
/// - `/` - Service banner
/// - `/register`, `/login` - Account creation and authentication
/// - `/users/:username` - Public account lookup
/// - `/fetch?url=` - Admission-checked outbound fetch
/// - `/health` - Database-backed health check
/// - `/metrics` - Prometheus metrics
///
/// Layers, innermost first: request tracing, request timeout (see
/// [`request_timeout`]), HTTP metrics.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let timeout = request_timeout(&state.config.fetch_policy);

    let app_routes = Router::new()
        .route("/", get(handlers::service_info))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/users/:username", get(handlers::get_user))
        .route("/fetch", get(handlers::fetch_url))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        // Outermost, so framework-level rejections are counted too
        .layer(middleware::from_fn(http_metrics_middleware))
}
