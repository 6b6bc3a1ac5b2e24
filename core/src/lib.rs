//! Quartermaster Core Library
//!
//! This library contains the core functionality of the Foxhole logistics
//! quartermaster: configuration, the tenant and permission model, persistent
//! storage, and the Discord bot with its bounded reconnect loop.

pub mod bot;
pub mod config;
pub mod error;
pub mod model;
pub mod rbac;
pub mod store;
pub mod tenant;

// Re-exports for convenience
pub use bot::{ConnectionState, DiscordBot, ReconnectController, ReconnectPolicy};
pub use config::{
    Config, DatabaseConfig, DiscordConfig, ReconnectConfig, get_config_dir, get_config_path,
    get_data_dir, load_config, save_config,
};
pub use error::*;
pub use model::{
    Faction, LogisticsTask, MemberSummary, NewLogisticsTask, NewProductionNode, NewSupplyNode,
    NewTenant, NewUser, ProductionNode, SupplyNode, TaskStatus, TenantRecord, User,
};
pub use rbac::{AuditLogger, Permission, Role, RolePermissionMap, process_audit_logs};
pub use store::{InMemoryStore, SqliteStore, TenantStore};
pub use tenant::{Tenant, TenantContext, TenantManager, TenantResult};
