pub mod account_service;
pub mod fetch_gatekeeper;
