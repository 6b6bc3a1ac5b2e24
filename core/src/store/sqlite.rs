//! SQLite implementation of the tenant store.
//!
//! # Schema
//! Migrations in `core/migrations` run on connect, before the store is handed
//! out. UUIDs are stored as blobs, JSON documents as text, timestamps as
//! RFC 3339 text.
//!
//! # Transactions
//! Multi-statement writes (`create_tenant`, `transition_task`) run inside one
//! transaction. Uniqueness is enforced by the schema, and constraint
//! violations surface as `StoreError::Conflict` (unique) or
//! `StoreError::NotFound` (foreign key).
//!
//! # In-memory databases
//! `sqlite::memory:` gives each connection its own database, so
//! [`SqliteStore::connect_in_memory`] pins the pool to a single connection
//! that never expires.

use super::{StoreError, TaskTransition, TenantStore};
use crate::config::DatabaseConfig;
use crate::error::StoreResult;
use crate::model::{
    Faction, LogisticsTask, MemberSummary, Membership, NewUser, ProductionNode, SupplyNode,
    TaskStatus, TenantRecord, User,
};
use crate::rbac::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    discord_id: String,
    username: String,
    display_name: Option<String>,
    is_server_admin: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    slug: String,
    discord_guild_id: String,
    faction: Option<String>,
    description: Option<String>,
    config: Json<serde_json::Value>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TenantRoleRow {
    #[sqlx(flatten)]
    tenant: TenantRow,
    member_role: String,
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    user_id: Uuid,
    tenant_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    user_id: Uuid,
    discord_id: String,
    username: String,
    display_name: Option<String>,
    role: String,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SupplyNodeRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    location: String,
    node_type: String,
    inventory: Json<serde_json::Value>,
    desired_state: Json<serde_json::Value>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ProductionNodeRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    location: String,
    facility_type: String,
    production_queue: Json<serde_json::Value>,
    capabilities: Json<serde_json::Value>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    description: Option<String>,
    task_type: String,
    task_data: Json<serde_json::Value>,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
    status: String,
    priority: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `config.url` and migrate it.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn connect_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("sqlite store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl TenantStore for SqliteStore {
    async fn get_or_create_user(&self, user: NewUser) -> StoreResult<User> {
        let candidate = user.into_user();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO users (id, discord_id, username, display_name, is_server_admin, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (discord_id) DO NOTHING"#,
        )
        .bind(candidate.id)
        .bind(&candidate.discord_id)
        .bind(&candidate.username)
        .bind(&candidate.display_name)
        .bind(candidate.is_server_admin)
        .bind(candidate.is_active)
        .bind(candidate.created_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE discord_id = ?")
            .bind(&candidate.discord_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(user_from_row(row))
    }

    async fn user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE discord_id = ?")
            .bind(discord_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(user_from_row))
    }

    async fn set_server_admin(&self, discord_id: &str, is_admin: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_server_admin = ? WHERE discord_id = ?")
            .bind(is_admin)
            .bind(discord_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_tenant(
        &self,
        tenant: TenantRecord,
        creator_id: Uuid,
        creator_role: Role,
    ) -> StoreResult<TenantRecord> {
        let mut tx = self.pool.begin().await?;
        let insert = sqlx::query(
            r#"INSERT INTO tenants (id, name, slug, discord_guild_id, faction, description, config, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.discord_guild_id)
        .bind(tenant.faction.map(|f| f.as_str()))
        .bind(&tenant.description)
        .bind(Json(&tenant.config))
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&mut *tx)
        .await;
        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict(format!(
                    "tenant with slug '{}' or guild {} exists",
                    tenant.slug, tenant.discord_guild_id
                )));
            }
            return Err(err.into());
        }

        sqlx::query(
            "INSERT INTO memberships (user_id, tenant_id, role, joined_at, is_active) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(creator_id)
        .bind(tenant.id)
        .bind(creator_role.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tenant)
    }

    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT * FROM tenants WHERE slug = ? AND is_active = 1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.map(tenant_from_row).transpose()
    }

    async fn tenant_by_guild(&self, guild_id: &str) -> StoreResult<Option<TenantRecord>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT * FROM tenants WHERE discord_guild_id = ? AND is_active = 1",
        )
        .bind(guild_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(tenant_from_row).transpose()
    }

    async fn list_tenants(&self) -> StoreResult<Vec<TenantRecord>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT * FROM tenants WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(tenant_from_row).collect()
    }

    async fn tenants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(TenantRecord, Role)>> {
        let rows = sqlx::query_as::<_, TenantRoleRow>(
            r#"SELECT t.*, m.role AS member_role
               FROM tenants t
               JOIN memberships m ON m.tenant_id = t.id
               WHERE m.user_id = ? AND m.is_active = 1 AND t.is_active = 1
               ORDER BY t.name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let role = parse_role(&row.member_role)?;
                Ok((tenant_from_row(row.tenant)?, role))
            })
            .collect()
    }

    async fn update_tenant_config(
        &self,
        tenant_id: Uuid,
        config: serde_json::Value,
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE tenants SET config = ?, updated_at = ? WHERE id = ?")
            .bind(Json(&config))
            .bind(Utc::now())
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tenant {}", tenant_id)));
        }
        Ok(())
    }

    async fn insert_membership(&self, membership: Membership) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO memberships (user_id, tenant_id, role, joined_at, is_active)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (user_id, tenant_id) DO NOTHING"#,
        )
        .bind(membership.user_id)
        .bind(membership.tenant_id)
        .bind(membership.role.as_str())
        .bind(membership.joined_at)
        .bind(membership.is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE tenant_id = ? AND user_id = ?")
            .bind(tenant_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_membership_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE memberships SET role = ? WHERE tenant_id = ? AND user_id = ?")
                .bind(role.as_str())
                .bind(tenant_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn membership(&self, tenant_id: Uuid, user_id: Uuid) -> StoreResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT * FROM memberships WHERE tenant_id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(Membership {
                user_id: row.user_id,
                tenant_id: row.tenant_id,
                role: parse_role(&row.role)?,
                joined_at: row.joined_at,
                is_active: row.is_active,
            })
        })
        .transpose()
    }

    async fn list_members(&self, tenant_id: Uuid) -> StoreResult<Vec<MemberSummary>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"SELECT u.id AS user_id, u.discord_id, u.username, u.display_name, m.role, m.joined_at
               FROM memberships m
               JOIN users u ON u.id = m.user_id
               WHERE m.tenant_id = ? AND m.is_active = 1
               ORDER BY m.joined_at"#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(MemberSummary {
                    user_id: row.user_id,
                    discord_id: row.discord_id,
                    username: row.username,
                    display_name: row.display_name,
                    role: parse_role(&row.role)?,
                    joined_at: row.joined_at,
                })
            })
            .collect()
    }

    async fn insert_supply_node(&self, node: SupplyNode) -> StoreResult<SupplyNode> {
        sqlx::query(
            r#"INSERT INTO supply_nodes (id, tenant_id, name, location, node_type, inventory, desired_state, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(node.id)
        .bind(node.tenant_id)
        .bind(&node.name)
        .bind(&node.location)
        .bind(&node.node_type)
        .bind(Json(&node.inventory))
        .bind(Json(&node.desired_state))
        .bind(node.is_active)
        .bind(node.created_at)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn supply_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<SupplyNode>> {
        let rows = sqlx::query_as::<_, SupplyNodeRow>(
            "SELECT * FROM supply_nodes WHERE tenant_id = ? AND is_active = 1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| SupplyNode {
                id: row.id,
                tenant_id: row.tenant_id,
                name: row.name,
                location: row.location,
                node_type: row.node_type,
                inventory: row.inventory.0,
                desired_state: row.desired_state.0,
                is_active: row.is_active,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn insert_production_node(&self, node: ProductionNode) -> StoreResult<ProductionNode> {
        sqlx::query(
            r#"INSERT INTO production_nodes (id, tenant_id, name, location, facility_type, production_queue, capabilities, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(node.id)
        .bind(node.tenant_id)
        .bind(&node.name)
        .bind(&node.location)
        .bind(&node.facility_type)
        .bind(Json(&node.production_queue))
        .bind(Json(&node.capabilities))
        .bind(node.is_active)
        .bind(node.created_at)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn production_nodes(&self, tenant_id: Uuid) -> StoreResult<Vec<ProductionNode>> {
        let rows = sqlx::query_as::<_, ProductionNodeRow>(
            "SELECT * FROM production_nodes WHERE tenant_id = ? AND is_active = 1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ProductionNode {
                id: row.id,
                tenant_id: row.tenant_id,
                name: row.name,
                location: row.location,
                facility_type: row.facility_type,
                production_queue: row.production_queue.0,
                capabilities: row.capabilities.0,
                is_active: row.is_active,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn insert_task(&self, task: LogisticsTask) -> StoreResult<LogisticsTask> {
        sqlx::query(
            r#"INSERT INTO logistics_tasks (id, tenant_id, title, description, task_type, task_data, created_by,
                                            assigned_to, status, priority, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id)
        .bind(task.tenant_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(Json(&task.task_data))
        .bind(task.created_by)
        .bind(task.assigned_to)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(task)
    }

    async fn tasks(
        &self,
        tenant_id: Uuid,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<LogisticsTask>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"SELECT * FROM logistics_tasks
               WHERE tenant_id = ? AND (? IS NULL OR status = ?)
               ORDER BY priority DESC, created_at ASC"#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(task_from_row).collect()
    }

    async fn task(&self, tenant_id: Uuid, task_id: Uuid) -> StoreResult<Option<LogisticsTask>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM logistics_tasks WHERE id = ? AND tenant_id = ?",
        )
        .bind(task_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(task_from_row).transpose()
    }

    async fn transition_task(
        &self,
        tenant_id: Uuid,
        task_id: Uuid,
        transition: TaskTransition,
    ) -> StoreResult<Option<LogisticsTask>> {
        let now = Utc::now();
        let completed_at = (transition.to == TaskStatus::Completed).then_some(now);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE logistics_tasks
               SET status = ?, assigned_to = COALESCE(?, assigned_to), updated_at = ?,
                   completed_at = COALESCE(?, completed_at)
               WHERE id = ? AND tenant_id = ? AND status = ?"#,
        )
        .bind(transition.to.as_str())
        .bind(transition.assignee)
        .bind(now)
        .bind(completed_at)
        .bind(task_id)
        .bind(tenant_id)
        .bind(transition.from.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM logistics_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        task_from_row(row).map(Some)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn parse_role(raw: &str) -> StoreResult<Role> {
    Role::from_str(raw).ok_or_else(|| StoreError::Unexpected(anyhow::anyhow!("unknown role {raw:?}")))
}

fn user_from_row(row: UserRow) -> User {
    User {
        id: row.id,
        discord_id: row.discord_id,
        username: row.username,
        display_name: row.display_name,
        is_server_admin: row.is_server_admin,
        is_active: row.is_active,
        created_at: row.created_at,
    }
}

fn tenant_from_row(row: TenantRow) -> StoreResult<TenantRecord> {
    let faction = match row.faction.as_deref() {
        Some(raw) => Some(Faction::from_str(raw).ok_or_else(|| {
            StoreError::Unexpected(anyhow::anyhow!("unknown faction {raw:?}"))
        })?),
        None => None,
    };
    Ok(TenantRecord {
        id: row.id,
        name: row.name,
        slug: row.slug,
        discord_guild_id: row.discord_guild_id,
        faction,
        description: row.description,
        config: row.config.0,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn task_from_row(row: TaskRow) -> StoreResult<LogisticsTask> {
    let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
        StoreError::Unexpected(anyhow::anyhow!("unknown task status {:?}", row.status))
    })?;
    Ok(LogisticsTask {
        id: row.id,
        tenant_id: row.tenant_id,
        title: row.title,
        description: row.description,
        task_type: row.task_type,
        task_data: row.task_data.0,
        created_by: row.created_by,
        assigned_to: row.assigned_to,
        status,
        priority: row.priority,
        created_at: row.created_at,
        updated_at: row.updated_at,
        completed_at: row.completed_at,
    })
}
