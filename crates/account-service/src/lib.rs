//! Account Service Library
//!
//! Registration, authentication and lookup of accounts backed by SQLite, plus
//! an admission-checked outbound fetch proxy.
//!
//! # Modules
//!
//! - `config` - Service configuration and fetch policy
//! - `crypto` - Credential hashing (Argon2id, legacy bcrypt verification)
//! - `db` - SQLite connection pool and migrations
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP middleware
//! - `models` - Request, response and view types
//! - `observability` - Metrics and log-field hashing
//! - `repositories` - Database access layer
//! - `routes` - Router and application state
//! - `services` - Business logic layer

pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
