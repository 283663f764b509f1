pub mod audit_log;
pub mod auth;
pub mod proof;
