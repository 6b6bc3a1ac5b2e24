//! Error types for the quartermaster

use crate::rbac::{Permission, Role};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for quartermaster operations
pub type Result<T> = std::result::Result<T, QuartermasterError>;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Main error type for the quartermaster
#[derive(Error, Debug)]
pub enum QuartermasterError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Tenant and permission errors
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    /// Discord connection errors
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Persistence errors shared by every store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Tenant, membership and permission errors
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Tenant already exists (slug '{slug}' or guild {guild_id})")]
    AlreadyExists { slug: String, guild_id: String },

    #[error("User is not a member of tenant '{0}'")]
    NotMember(String),

    #[error("Permission denied: {permission} required in tenant '{tenant}'")]
    PermissionDenied { permission: Permission, tenant: String },

    #[error("Role {0} cannot be assigned as a tenant membership")]
    InvalidRole(Role),

    #[error("Invalid tenant slug: {0:?}")]
    InvalidSlug(String),

    #[error("Invalid task transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by a single Discord connection attempt
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Transient failure, eligible for retry
    #[error("connection failed: {0}")]
    Connection(String),

    /// Rejected credentials, never retried
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Operator interrupt, never retried
    #[error("connection cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Whether the reconnect loop may try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Connection(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound(db_err.message().to_string())
            }
            _ => StoreError::Unexpected(err.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unexpected(anyhow::anyhow!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for QuartermasterError {
    fn from(err: anyhow::Error) -> Self {
        QuartermasterError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for QuartermasterError {
    fn from(err: serde_json::Error) -> Self {
        QuartermasterError::Other(format!("JSON error: {}", err))
    }
}
