//! Multi-tenant membership and permission model
//!
//! A [`TenantManager`] owns the lookup and lifecycle of tenants, a [`Tenant`]
//! scopes membership and data operations to one regiment, and a
//! [`TenantContext`] is the immutable per-request capability snapshot that
//! command handlers check before acting.

mod context;
mod entity;
mod manager;

#[cfg(test)]
mod tests;

pub use context::TenantContext;
pub use entity::{Tenant, TenantResult};
pub use manager::TenantManager;
