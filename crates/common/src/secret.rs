//! Secret types for keeping sensitive values out of logs.
//!
//! Re-exports [`secrecy`] types. Every plaintext password, configured login
//! token, or other credential that passes through the service is held in a
//! [`SecretString`], whose `Debug` output is redacted. A struct deriving
//! `Debug` that contains one of these is therefore safe to log with `{:?}`
//! or as a `tracing` field.
//!
//! Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     username: "alice".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter2"));
//!
//! // Reading the value is always explicit.
//! let password: &str = req.password.expose_secret();
//! assert_eq!(password, "hunter2");
//! ```
//!
//! # Serde
//!
//! The `serde` feature of `secrecy` is enabled, so request bodies can
//! deserialize straight into a `SecretString`:
//!
//! ```rust
//! use common::secret::SecretString;
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct RegisterRequest {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let json = r#"{"username": "bob", "password": "correct horse"}"#;
//! let req: RegisterRequest = serde_json::from_str(json).unwrap();
//! assert!(!format!("{req:?}").contains("correct horse"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
