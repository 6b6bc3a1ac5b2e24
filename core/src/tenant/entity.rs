//! A single tenant and the operations scoped to it

use crate::error::{StoreError, TenantError};
use crate::model::{
    LogisticsTask, MemberSummary, Membership, NewLogisticsTask, NewProductionNode, NewSupplyNode,
    ProductionNode, SupplyNode, TaskStatus, TenantRecord, User,
};
use crate::rbac::{Permission, Role, RolePermissionMap};
use crate::store::{TaskTransition, TenantStore};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub type TenantResult<T> = std::result::Result<T, TenantError>;

/// One regiment. Every mutation goes through the store as a single atomic call.
#[derive(Clone)]
pub struct Tenant {
    record: TenantRecord,
    store: Arc<dyn TenantStore>,
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("record", &self.record)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl Tenant {
    pub(crate) fn new(record: TenantRecord, store: Arc<dyn TenantStore>) -> Self {
        Self { record, store }
    }

    pub fn record(&self) -> &TenantRecord {
        &self.record
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn slug(&self) -> &str {
        &self.record.slug
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn guild_id(&self) -> &str {
        &self.record.discord_guild_id
    }

    /// Returns `Ok(false)` if the user already belongs to this tenant; the
    /// existing role is left untouched.
    pub async fn add_member(&self, user: &User, role: Role) -> TenantResult<bool> {
        if !role.is_assignable() {
            return Err(TenantError::InvalidRole(role));
        }
        let added = self
            .store
            .insert_membership(Membership::new(user.id, self.id(), role))
            .await?;
        if added {
            info!("added {} to {} as {}", user.username, self.slug(), role);
        } else {
            debug!("{} is already a member of {}", user.username, self.slug());
        }
        Ok(added)
    }

    pub async fn remove_member(&self, user: &User) -> TenantResult<bool> {
        let removed = self.store.delete_membership(self.id(), user.id).await?;
        if removed {
            info!("removed {} from {}", user.username, self.slug());
        }
        Ok(removed)
    }

    pub async fn update_member_role(&self, user: &User, role: Role) -> TenantResult<bool> {
        if !role.is_assignable() {
            return Err(TenantError::InvalidRole(role));
        }
        let updated = self
            .store
            .update_membership_role(self.id(), user.id, role)
            .await?;
        if updated {
            info!("{} is now {} in {}", user.username, role, self.slug());
        }
        Ok(updated)
    }

    /// Role from the user's active membership, if any
    pub async fn get_user_role(&self, user: &User) -> TenantResult<Option<Role>> {
        let membership = self.store.membership(self.id(), user.id).await?;
        Ok(membership.map(|m| m.role))
    }

    pub async fn has_permission(&self, user: &User, permission: Permission) -> TenantResult<bool> {
        if user.is_server_admin {
            return Ok(true);
        }
        Ok(self
            .get_user_role(user)
            .await?
            .is_some_and(|role| RolePermissionMap::global().grants(role, permission)))
    }

    /// Like `has_permission`, but distinguishes non-members from members
    /// lacking the permission.
    pub async fn require_permission(&self, user: &User, permission: Permission) -> TenantResult<()> {
        if user.is_server_admin {
            return Ok(());
        }
        match self.get_user_role(user).await? {
            None => Err(TenantError::NotMember(self.slug().to_string())),
            Some(role) if RolePermissionMap::global().grants(role, permission) => Ok(()),
            Some(_) => Err(TenantError::PermissionDenied {
                permission,
                tenant: self.slug().to_string(),
            }),
        }
    }

    pub async fn list_members(&self) -> TenantResult<Vec<MemberSummary>> {
        Ok(self.store.list_members(self.id()).await?)
    }

    pub async fn members_with_role(&self, role: Role) -> TenantResult<Vec<MemberSummary>> {
        let mut members = self.list_members().await?;
        members.retain(|m| m.role == role);
        Ok(members)
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.record.config
    }

    pub async fn update_config(&mut self, config: serde_json::Value) -> TenantResult<()> {
        self.store.update_tenant_config(self.id(), config.clone()).await?;
        self.record.config = config;
        Ok(())
    }

    pub async fn create_supply_node(&self, node: NewSupplyNode) -> TenantResult<SupplyNode> {
        let node = self.store.insert_supply_node(node.into_node(self.id())).await?;
        info!("created supply node '{}' in {}", node.name, self.slug());
        Ok(node)
    }

    pub async fn get_supply_nodes(&self) -> TenantResult<Vec<SupplyNode>> {
        Ok(self.store.supply_nodes(self.id()).await?)
    }

    pub async fn create_production_node(
        &self,
        node: NewProductionNode,
    ) -> TenantResult<ProductionNode> {
        let node = self
            .store
            .insert_production_node(node.into_node(self.id()))
            .await?;
        info!("created production node '{}' in {}", node.name, self.slug());
        Ok(node)
    }

    pub async fn get_production_nodes(&self) -> TenantResult<Vec<ProductionNode>> {
        Ok(self.store.production_nodes(self.id()).await?)
    }

    /// Assignees must be members of this tenant.
    pub async fn create_task(
        &self,
        task: NewLogisticsTask,
        created_by: &User,
    ) -> TenantResult<LogisticsTask> {
        if let Some(assignee) = task.assigned_to
            && self.store.membership(self.id(), assignee).await?.is_none()
        {
            return Err(TenantError::NotMember(self.slug().to_string()));
        }
        let task = self
            .store
            .insert_task(task.into_task(self.id(), created_by.id))
            .await?;
        info!("created task '{}' in {}", task.title, self.slug());
        Ok(task)
    }

    pub async fn get_tasks(&self, status: Option<TaskStatus>) -> TenantResult<Vec<LogisticsTask>> {
        Ok(self.store.tasks(self.id(), status).await?)
    }

    pub async fn get_task(&self, task_id: Uuid) -> TenantResult<Option<LogisticsTask>> {
        Ok(self.store.task(self.id(), task_id).await?)
    }

    /// Pending → in progress, assigned to `user`
    pub async fn accept_task(&self, task_id: Uuid, user: &User) -> TenantResult<LogisticsTask> {
        self.transition(
            task_id,
            TaskTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::InProgress,
                assignee: Some(user.id),
            },
        )
        .await
    }

    /// In progress → completed
    pub async fn complete_task(&self, task_id: Uuid) -> TenantResult<LogisticsTask> {
        self.transition(
            task_id,
            TaskTransition {
                from: TaskStatus::InProgress,
                to: TaskStatus::Completed,
                assignee: None,
            },
        )
        .await
    }

    async fn transition(
        &self,
        task_id: Uuid,
        transition: TaskTransition,
    ) -> TenantResult<LogisticsTask> {
        if let Some(task) = self
            .store
            .transition_task(self.id(), task_id, transition)
            .await?
        {
            return Ok(task);
        }

        match self.store.task(self.id(), task_id).await? {
            None => Err(StoreError::NotFound(format!("task {}", task_id)).into()),
            Some(task) => Err(TenantError::InvalidTransition(format!(
                "task is {}, expected {}",
                task.status, transition.from
            ))),
        }
    }
}
