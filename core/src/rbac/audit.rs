//! Audit logging for permission checks

use crate::rbac::{Permission, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Timestamp of the check
    pub timestamp: DateTime<Utc>,
    /// Tenant slug
    pub tenant: String,
    /// Discord user ID
    pub user_id: String,
    /// Resolved role, if the user is a member
    pub role: Option<Role>,
    /// Permission that was required
    pub permission: Permission,
    /// Result: "allowed" or "denied"
    pub result: String,
    /// Command or action that triggered the check
    pub action: String,
}

/// Audit logger for permission decisions
#[derive(Clone)]
pub struct AuditLogger {
    sender: mpsc::UnboundedSender<AuditLogEntry>,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditLogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Log a permission check
    pub fn log(
        &self,
        tenant: &str,
        user_id: &str,
        role: Option<Role>,
        permission: Permission,
        action: &str,
        allowed: bool,
    ) {
        let entry = AuditLogEntry {
            timestamp: Utc::now(),
            tenant: tenant.to_string(),
            user_id: user_id.to_string(),
            role,
            permission,
            result: if allowed { "allowed" } else { "denied" }.to_string(),
            action: action.to_string(),
        };

        if self.sender.is_closed() {
            debug!("audit channel closed, dropping entry for {}", entry.action);
        } else if let Err(e) = self.sender.send(entry.clone()) {
            error!("Failed to send audit log entry: {}", e);
        } else {
            debug!(
                "Audit: tenant={} user={} permission={} result={}",
                entry.tenant, entry.user_id, entry.permission, entry.result
            );
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }
}

/// Background task draining audit entries into tracing
pub async fn process_audit_logs(mut receiver: mpsc::UnboundedReceiver<AuditLogEntry>) {
    while let Some(entry) = receiver.recv().await {
        tracing::info!(
            target: "quartermaster::audit",
            tenant = %entry.tenant,
            user = %entry.user_id,
            role = ?entry.role,
            permission = %entry.permission,
            action = %entry.action,
            result = %entry.result,
            "permission check"
        );
    }
}
