//! In-memory implementation of the tenant store.
//!
//! Used by tests and for running the bot without a database. All tables sit
//! behind one `tokio::sync::RwLock`, so each mutating call observes and
//! commits a consistent state. Nothing survives a restart.

use super::{StoreError, TaskTransition, TenantStore};
use crate::error::StoreResult;
use crate::model::{
    LogisticsTask, MemberSummary, Membership, NewUser, ProductionNode, SupplyNode, TaskStatus,
    TenantRecord, User,
};
use crate::rbac::Role;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    tenants: HashMap<Uuid, TenantRecord>,
    // keyed by (tenant_id, user_id)
    memberships: HashMap<(Uuid, Uuid), Membership>,
    supply_nodes: HashMap<Uuid, SupplyNode>,
    production_nodes: HashMap<Uuid, ProductionNode>,
    tasks: HashMap<Uuid, LogisticsTask>,
}

impl State {
    fn require_tenant(&self, tenant_id: Uuid) -> StoreResult<()> {
        if self.tenants.contains_key(&tenant_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("tenant {}", tenant_id)))
        }
    }

    fn require_user(&self, user_id: Uuid) -> StoreResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("user {}", user_id)))
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryStore {
    async fn get_or_create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.values().find(|u| u.discord_id == user.discord_id) {
            return Ok(existing.clone());
        }
        let user = user.into_user();
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.discord_id == discord_id).cloned())
    }

    async fn set_server_admin(&self, discord_id: &str, is_admin: bool) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.users.values_mut().find(|u| u.discord_id == discord_id) {
            Some(user) => {
                user.is_server_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_tenant(
        &self,
        tenant: TenantRecord,
        creator_id: Uuid,
        creator_role: Role,
    ) -> StoreResult<TenantRecord> {
        let mut state = self.state.write().await;
        if state.tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(StoreError::Conflict(format!("slug '{}' is taken", tenant.slug)));
        }
        if state
            .tenants
            .values()
            .any(|t| t.discord_guild_id == tenant.discord_guild_id)
        {
            return Err(StoreError::Conflict(format!(
                "guild {} already has a tenant",
                tenant.discord_guild_id
            )));
        }
        state.require_user(creator_id)?;

        let membership = Membership::new(creator_id, tenant.id, creator_role);
        state.memberships.insert((tenant.id, creator_id), membership);
        state.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>> {
        let state = self.state.read().await;
        Ok(state
            .tenants
            .values()
            .find(|t| t.slug == slug && t.is_active)
            .cloned())
    }

    async fn tenant_by_guild(&self, guild_id: &str) -> StoreResult<Option<TenantRecord>> {
        let state = self.state.read().await;
        Ok(state
            .tenants
            .values()
            .find(|t| t.discord_guild_id == guild_id && t.is_active)
            .cloned())
    }

    async fn list_tenants(&self) -> StoreResult<Vec<TenantRecord>> {
        let state = self.state.read().await;
        let mut tenants: Vec<_> = state.tenants.values().filter(|t| t.is_active).cloned().collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn tenants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(TenantRecord, Role)>> {
        let state = self.state.read().await;
        let mut out: Vec<_> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.is_active)
            .filter_map(|m| {
                state
                    .tenants
                    .get(&m.tenant_id)
                    .filter(|t| t.is_active)
                    .map(|t| (t.clone(), m.role))
            })
            .collect();
        out.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(out)
    }

    async fn update_tenant_config(
        &self,
        tenant_id: Uuid,
        config: serde_json::Value,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let tenant = state
            .tenants
            .get_mut(&tenant_id)
            .ok_or_else(|| StoreError::NotFound(format!("tenant {}", tenant_id)))?;
        tenant.config = config;
        tenant.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_membership(&self, membership: Membership) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        state.require_tenant(membership.tenant_id)?;
        state.require_user(membership.user_id)?;

        let key = (membership.tenant_id, membership.user_id);
        if state.memberships.contains_key(&key) {
            return Ok(false);
        }
        state.memberships.insert(key, membership);
        Ok(true)
    }

    async fn delete_membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.memberships.remove(&(tenant_id, user_id)).is_some())
    }

    async fn update_membership_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.memberships.get_mut(&(tenant_id, user_id)) {
            Some(membership) => {
                membership.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(&(tenant_id, user_id))
            .filter(|m| m.is_active)
            .cloned())
    }

    async fn list_members(&self, tenant_id: Uuid) -> StoreResult<Vec<MemberSummary>> {
        let state = self.state.read().await;
        let mut members: Vec<_> = state
            .memberships
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.is_active)
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|u| MemberSummary {
                    user_id: u.id,
                    discord_id: u.discord_id.clone(),
                    username: u.username.clone(),
                    display_name: u.display_name.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn insert_supply_node(&self, node: SupplyNode) -> StoreResult<SupplyNode> {
        let mut state = self.state.write().await;
        state.require_tenant(node.tenant_id)?;
        if state
            .supply_nodes
            .values()
            .any(|n| n.tenant_id == node.tenant_id && n.name == node.name)
        {
            return Err(StoreError::Conflict(format!("supply node '{}' exists", node.name)));
        }
        state.supply_nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn supply_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<SupplyNode>> {
        let state = self.state.read().await;
        let mut nodes: Vec<_> = state
            .supply_nodes
            .values()
            .filter(|n| n.tenant_id == tenant_id && n.is_active)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn insert_production_node(&self, node: ProductionNode) -> StoreResult<ProductionNode> {
        let mut state = self.state.write().await;
        state.require_tenant(node.tenant_id)?;
        if state
            .production_nodes
            .values()
            .any(|n| n.tenant_id == node.tenant_id && n.name == node.name)
        {
            return Err(StoreError::Conflict(format!(
                "production node '{}' exists",
                node.name
            )));
        }
        state.production_nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn production_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<ProductionNode>> {
        let state = self.state.read().await;
        let mut nodes: Vec<_> = state
            .production_nodes
            .values()
            .filter(|n| n.tenant_id == tenant_id && n.is_active)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn insert_task(&self, task: LogisticsTask) -> StoreResult<LogisticsTask> {
        let mut state = self.state.write().await;
        state.require_tenant(task.tenant_id)?;
        state.require_user(task.created_by)?;
        if let Some(assignee) = task.assigned_to {
            state.require_user(assignee)?;
        }
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn tasks(
        &self,
        tenant_id: Uuid,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<LogisticsTask>> {
        let state = self.state.read().await;
        let mut tasks: Vec<_> = state
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(tasks)
    }

    async fn task(&self, tenant_id: Uuid, task_id: Uuid) -> StoreResult<Option<LogisticsTask>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(&task_id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn transition_task(
        &self,
        tenant_id: Uuid,
        task_id: Uuid,
        transition: TaskTransition,
    ) -> StoreResult<Option<LogisticsTask>> {
        let mut state = self.state.write().await;
        if let Some(assignee) = transition.assignee {
            state.require_user(assignee)?;
        }
        let Some(task) = state
            .tasks
            .get_mut(&task_id)
            .filter(|t| t.tenant_id == tenant_id && t.status == transition.from)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        task.status = transition.to;
        task.updated_at = now;
        if let Some(assignee) = transition.assignee {
            task.assigned_to = Some(assignee);
        }
        if transition.to == TaskStatus::Completed {
            task.completed_at = Some(now);
        }
        Ok(Some(task.clone()))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
