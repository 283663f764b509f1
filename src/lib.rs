pub mod commands;
pub mod comms;
pub mod config;
pub mod error;
pub mod issuance;
pub mod security;
pub mod store;
pub mod transport;
pub mod utils;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
