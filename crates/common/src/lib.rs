//! Utilities shared between the account service and its test harness.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;
