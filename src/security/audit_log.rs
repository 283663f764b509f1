use tracing::{info, warn};

/// Structured audit events. Never receives secrets or access tokens.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn config_written(&self, kind: &str, key: &str) {
        info!(target: "audit", event = "config_written", kind, key);
    }

    pub fn config_deleted(&self, kind: &str, key: &str) {
        info!(target: "audit", event = "config_deleted", kind, key);
    }

    pub fn credential_issued(&self, request_id: &str, user_id: &str, device_id: &str) {
        info!(target: "audit", event = "credential_issued", request_id, user_id, device_id);
    }

    pub fn sessions_revoked(&self, request_id: &str, user_id: &str) {
        info!(target: "audit", event = "sessions_revoked", request_id, user_id);
    }

    pub fn issuance_failed(&self, request_id: &str, user_id: &str, error_msg: &str) {
        warn!(target: "audit", event = "issuance_failed", request_id, user_id, error = error_msg);
    }

    pub fn unauthorized(&self, path: &str, reason: &str) {
        warn!(target: "audit", event = "unauthorized", path, reason);
    }
}
