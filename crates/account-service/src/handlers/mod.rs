//! HTTP request handlers for the account service.

pub mod account_handler;
pub mod fetch_handler;
pub mod health;
pub mod metrics;

pub use account_handler::{get_user, login, register};
pub use fetch_handler::fetch_url;
pub use health::{health_check, service_info};
pub use metrics::metrics_handler;
