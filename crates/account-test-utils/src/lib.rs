//! # Account Test Utilities
//!
//! Shared test utilities for the account service.
//!
//! This crate provides:
//! - Fixtures (fast hashing parameters, fetch policies, ready-made configs)
//! - Server test harness (`TestAccountServer` for E2E tests)
//! - Custom assertions (`ErrorBodyAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use account_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestAccountServer::spawn(test_config()).await?;
//!
//!     let response = server.register("alice", TEST_PASSWORD).await?;
//!     assert_eq!(response.status(), 201);
//!
//!     let body: serde_json::Value = server
//!         .client()
//!         .get(format!("{}/users/ghost", server.url()))
//!         .send()
//!         .await?
//!         .json()
//!         .await?;
//!     body.assert_error_code("NOT_FOUND");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
