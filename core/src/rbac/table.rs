//! Process-wide role to permission mapping
//!
//! The table is built once on first use and never mutated afterwards. Each
//! role holds every permission of the role ranked directly below it.

use super::{Permission, Role};
use std::collections::HashSet;
use std::sync::LazyLock;

static ROLE_PERMISSIONS: LazyLock<RolePermissionMap> = LazyLock::new(RolePermissionMap::build);

const END_USER: &[Permission] = &[
    Permission::UploadScreenshots,
    Permission::AcceptTasks,
    Permission::ViewTasks,
    Permission::MakeRequests,
];

const LOGISTICS_MANAGER: &[Permission] = &[
    Permission::ViewTenantData,
    Permission::EditSupplyGraph,
    Permission::EditProductionGraph,
    Permission::ManageInventory,
    Permission::AssignTasks,
];

const REGIMENT_ADMIN: &[Permission] = &[
    Permission::ManageTenant,
    Permission::ManageTenantUsers,
    Permission::ManageTenantRoles,
];

const SERVER_ADMIN: &[Permission] = &[
    Permission::ManageAllTenants,
    Permission::ViewAllTenants,
    Permission::ManageSystemConfig,
];

/// Read-only mapping from role to granted permissions
#[derive(Debug)]
pub struct RolePermissionMap {
    // indexed by Role::level
    grants: [HashSet<Permission>; Role::ALL.len()],
}

impl RolePermissionMap {
    fn build() -> Self {
        let mut grants: [HashSet<Permission>; Role::ALL.len()] = Default::default();
        let mut acc: HashSet<Permission> = HashSet::new();

        for role in Role::ALL {
            let added = match role {
                Role::EndUser => END_USER,
                Role::LogisticsManager => LOGISTICS_MANAGER,
                Role::RegimentAdmin => REGIMENT_ADMIN,
                Role::ServerAdmin => SERVER_ADMIN,
            };
            acc.extend(added.iter().copied());
            grants[role.level() as usize] = acc.clone();
        }

        Self { grants }
    }

    /// The shared table
    pub fn global() -> &'static RolePermissionMap {
        &ROLE_PERMISSIONS
    }

    /// Permissions granted to `role`
    pub fn permissions_for(&self, role: Role) -> &HashSet<Permission> {
        &self.grants[role.level() as usize]
    }

    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }
}

/// Shorthand for `RolePermissionMap::global().permissions_for(role)`
pub fn permissions_for(role: Role) -> &'static HashSet<Permission> {
    RolePermissionMap::global().permissions_for(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_user_permissions() {
        let perms = permissions_for(Role::EndUser);
        assert_eq!(perms.len(), 4);
        assert!(perms.contains(&Permission::ViewTasks));
        assert!(!perms.contains(&Permission::ViewTenantData));
    }

    #[test]
    fn test_server_admin_has_everything() {
        let perms = permissions_for(Role::ServerAdmin);
        assert_eq!(perms.len(), Permission::ALL.len());
    }

    #[test]
    fn test_same_instance() {
        assert!(std::ptr::eq(RolePermissionMap::global(), RolePermissionMap::global()));
    }
}
