//! Role-based access control for tenants
//!
//! Roles are ranked, permissions are a closed set, and the mapping between
//! them is a process-wide table built once.

pub mod audit;
pub mod permission;
pub mod role;
pub mod table;

#[cfg(test)]
mod tests;

pub use audit::{AuditLogEntry, AuditLogger, process_audit_logs};
pub use permission::Permission;
pub use role::Role;
pub use table::{RolePermissionMap, permissions_for};
