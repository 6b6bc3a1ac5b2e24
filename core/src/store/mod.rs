//! Relational persistence for users, tenants and tenant-owned data
//!
//! Every mutating call is atomic: the SQLite backend wraps it in a
//! transaction, the in-memory backend performs it under a single write lock.
//! Reads that may legitimately miss return `Option`, never `NotFound`.

use crate::error::StoreResult;
use crate::model::{
    LogisticsTask, MemberSummary, Membership, NewUser, ProductionNode, SupplyNode, TaskStatus,
    TenantRecord, User,
};
use crate::rbac::Role;
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod sqlite;

pub use crate::error::StoreError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Requested change to a task's lifecycle state
#[derive(Debug, Clone, Copy)]
pub struct TaskTransition {
    /// Status the task must currently have
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// New assignee, left untouched when `None`
    pub assignee: Option<Uuid>,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_or_create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>>;
    /// Returns false when no such user exists
    async fn set_server_admin(&self, discord_id: &str, is_admin: bool) -> StoreResult<bool>;

    /// Insert the tenant and the creator's membership together.
    /// A taken slug or guild id is a `Conflict`.
    async fn create_tenant(
        &self,
        tenant: TenantRecord,
        creator_id: Uuid,
        creator_role: Role,
    ) -> StoreResult<TenantRecord>;
    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>>;
    async fn tenant_by_guild(&self, guild_id: &str) -> StoreResult<Option<TenantRecord>>;
    async fn list_tenants(&self) -> StoreResult<Vec<TenantRecord>>;
    async fn tenants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(TenantRecord, Role)>>;
    async fn update_tenant_config(
        &self,
        tenant_id: Uuid,
        config: serde_json::Value,
    ) -> StoreResult<()>;

    /// Returns false, without writing, if the pair already has a membership
    async fn insert_membership(&self, membership: Membership) -> StoreResult<bool>;
    async fn delete_membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn update_membership_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> StoreResult<bool>;
    /// Active membership of `user_id` in `tenant_id`
    async fn membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>>;
    async fn list_members(&self, tenant_id: Uuid) -> StoreResult<Vec<MemberSummary>>;

    async fn insert_supply_node(&self, node: SupplyNode) -> StoreResult<SupplyNode>;
    async fn supply_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<SupplyNode>>;
    async fn insert_production_node(&self, node: ProductionNode) -> StoreResult<ProductionNode>;
    async fn production_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<ProductionNode>>;

    async fn insert_task(&self, task: LogisticsTask) -> StoreResult<LogisticsTask>;
    /// Highest priority first, then oldest first
    async fn tasks(
        &self,
        tenant_id: Uuid,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<LogisticsTask>>;
    async fn task(&self, tenant_id: Uuid, task_id: Uuid) -> StoreResult<Option<LogisticsTask>>;
    /// Applies the transition only if the task is in `transition.from`
    async fn transition_task(
        &self,
        tenant_id: Uuid,
        task_id: Uuid,
        transition: TaskTransition,
    ) -> StoreResult<Option<LogisticsTask>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
