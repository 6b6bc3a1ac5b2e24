//! Tenant lifecycle, lookup and per-request context construction

use super::{Tenant, TenantContext, TenantResult};
use crate::error::{StoreError, TenantError};
use crate::model::{NewTenant, NewUser, TenantRecord, User, validate_slug};
use crate::rbac::{Role, RolePermissionMap};
use crate::store::TenantStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct TenantManager {
    store: Arc<dyn TenantStore>,
}

impl TenantManager {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TenantStore> {
        &self.store
    }

    fn wrap(&self, record: TenantRecord) -> Tenant {
        Tenant::new(record, Arc::clone(&self.store))
    }

    pub async fn get_or_create_user(&self, user: NewUser) -> TenantResult<User> {
        Ok(self.store.get_or_create_user(user).await?)
    }

    pub async fn find_user(&self, discord_id: &str) -> TenantResult<Option<User>> {
        Ok(self.store.user_by_discord_id(discord_id).await?)
    }

    /// Returns false when the user has never been seen
    pub async fn set_server_admin(&self, discord_id: &str, is_admin: bool) -> TenantResult<bool> {
        let changed = self.store.set_server_admin(discord_id, is_admin).await?;
        if changed {
            info!("server admin flag for {} set to {}", discord_id, is_admin);
        }
        Ok(changed)
    }

    /// Clear the global admin flag. `None` for an unknown user, otherwise
    /// whether the flag was set before.
    pub async fn revoke_server_admin(&self, discord_id: &str) -> TenantResult<Option<bool>> {
        let Some(user) = self.store.user_by_discord_id(discord_id).await? else {
            return Ok(None);
        };
        if !user.is_server_admin {
            return Ok(Some(false));
        }
        self.store.set_server_admin(discord_id, false).await?;
        info!("revoked server admin from {}", discord_id);
        Ok(Some(true))
    }

    /// Create the user if needed and grant the global admin flag
    pub async fn ensure_server_admin(&self, discord_id: &str) -> TenantResult<User> {
        let user = self
            .store
            .get_or_create_user(NewUser::new(discord_id, format!("admin-{}", discord_id)))
            .await?;
        if user.is_server_admin {
            return Ok(user);
        }
        self.store.set_server_admin(discord_id, true).await?;
        info!("granted server admin to {}", discord_id);
        Ok(User {
            is_server_admin: true,
            ..user
        })
    }

    /// Create a tenant with `creator` as its first regiment admin.
    pub async fn create_tenant(&self, new_tenant: NewTenant, creator: &User) -> TenantResult<Tenant> {
        if !validate_slug(&new_tenant.slug) {
            return Err(TenantError::InvalidSlug(new_tenant.slug));
        }
        let slug = new_tenant.slug.clone();
        let guild_id = new_tenant.discord_guild_id.clone();

        let record = match self
            .store
            .create_tenant(new_tenant.into_record(), creator.id, Role::RegimentAdmin)
            .await
        {
            Ok(record) => record,
            Err(StoreError::Conflict(reason)) => {
                warn!("tenant creation rejected: {}", reason);
                return Err(TenantError::AlreadyExists { slug, guild_id });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "created tenant {} ({}) for guild {} by {}",
            record.name, record.slug, record.discord_guild_id, creator.username
        );
        Ok(self.wrap(record))
    }

    pub async fn get_tenant_by_discord_guild(&self, guild_id: &str) -> TenantResult<Option<Tenant>> {
        let record = self.store.tenant_by_guild(guild_id).await?;
        Ok(record.map(|r| self.wrap(r)))
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> TenantResult<Option<Tenant>> {
        let record = self.store.tenant_by_slug(slug).await?;
        Ok(record.map(|r| self.wrap(r)))
    }

    /// Slug first, then guild id
    pub async fn resolve_tenant(&self, slug_or_guild: &str) -> TenantResult<Option<Tenant>> {
        if let Some(tenant) = self.get_tenant_by_slug(slug_or_guild).await? {
            return Ok(Some(tenant));
        }
        self.get_tenant_by_discord_guild(slug_or_guild).await
    }

    pub async fn list_tenants(&self) -> TenantResult<Vec<Tenant>> {
        let records = self.store.list_tenants().await?;
        Ok(records.into_iter().map(|r| self.wrap(r)).collect())
    }

    pub async fn list_user_tenants(&self, user: &User) -> TenantResult<Vec<(Tenant, Role)>> {
        let rows = self.store.tenants_for_user(user.id).await?;
        Ok(rows
            .into_iter()
            .map(|(record, role)| (self.wrap(record), role))
            .collect())
    }

    /// Build the capability snapshot for `user` in the tenant named by
    /// `slug_or_guild`. Non-members get an empty permission set. Server
    /// admins always get the server admin tier, and the server admin role
    /// when they hold no membership.
    pub async fn create_tenant_context(
        &self,
        slug_or_guild: &str,
        user: &User,
    ) -> TenantResult<TenantContext> {
        let tenant = self
            .resolve_tenant(slug_or_guild)
            .await?
            .ok_or_else(|| TenantError::NotFound(slug_or_guild.to_string()))?;

        self.context_for(&tenant, user).await
    }

    /// Same as `create_tenant_context` for an already resolved tenant
    pub async fn context_for(&self, tenant: &Tenant, user: &User) -> TenantResult<TenantContext> {
        let role = match tenant.get_user_role(user).await? {
            Some(role) => Some(role),
            None if user.is_server_admin => Some(Role::ServerAdmin),
            None => None,
        };
        // the admin override wins over a lower membership role
        let effective = if user.is_server_admin {
            Some(Role::ServerAdmin)
        } else {
            role
        };
        let permissions = effective
            .map(|r| RolePermissionMap::global().permissions_for(r).clone())
            .unwrap_or_default();

        debug!(
            "context for {} in {}: role={:?} permissions={}",
            user.discord_id,
            tenant.slug(),
            role,
            permissions.len()
        );

        Ok(TenantContext::new(tenant.id(), tenant.slug(), tenant.guild_id())
            .with_user(user.id, role)
            .with_permissions(permissions))
    }
}
