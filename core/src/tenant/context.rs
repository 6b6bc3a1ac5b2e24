use crate::error::TenantError;
use crate::rbac::{Permission, Role};
use std::collections::HashSet;
use uuid::Uuid;

/// Immutable snapshot of what one user may do in one tenant, built per request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant_id: Uuid,
    tenant_slug: String,
    guild_id: String,
    user_id: Option<Uuid>,
    role: Option<Role>,
    permissions: HashSet<Permission>,
}

impl TenantContext {
    /// Context with no user and no permissions
    pub fn new(tenant_id: Uuid, tenant_slug: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            tenant_slug: tenant_slug.into(),
            guild_id: guild_id.into(),
            user_id: None,
            role: None,
            permissions: HashSet::new(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid, role: Option<Role>) -> Self {
        self.user_id = Some(user_id);
        self.role = role;
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn tenant_slug(&self) -> &str {
        &self.tenant_slug
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn permissions(&self) -> &HashSet<Permission> {
        &self.permissions
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Fails with `PermissionDenied` naming the permission and tenant.
    pub fn require_permission(&self, permission: Permission) -> Result<(), TenantError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(TenantError::PermissionDenied {
                permission,
                tenant: self.tenant_slug.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_permission() {
        let ctx = TenantContext::new(Uuid::new_v4(), "test-regiment", "987654321")
            .with_user(Uuid::new_v4(), Some(Role::EndUser))
            .with_permissions([Permission::ViewTasks]);

        assert!(ctx.require_permission(Permission::ViewTasks).is_ok());
        let err = ctx.require_permission(Permission::ManageTenant).unwrap_err();
        assert!(matches!(
            err,
            TenantError::PermissionDenied { permission: Permission::ManageTenant, ref tenant }
                if tenant == "test-regiment"
        ));
    }

    #[test]
    fn test_empty_context_denies_everything() {
        let ctx = TenantContext::new(Uuid::new_v4(), "t", "1");
        assert!(ctx.user_id().is_none());
        for permission in Permission::ALL {
            assert!(!ctx.has_permission(permission));
        }
    }

    #[test]
    fn test_context_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TenantContext>();
    }
}
