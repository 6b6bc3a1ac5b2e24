//! Comprehensive tests for the role/permission table

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashSet;

    fn perms(role: Role) -> &'static HashSet<Permission> {
        permissions_for(role)
    }

    #[test]
    fn test_every_role_has_permissions() {
        for role in Role::ALL {
            assert!(!perms(role).is_empty(), "{} has no permissions", role);
        }
    }

    #[test]
    fn test_roles_are_cumulative() {
        let ranked = Role::ALL;
        for pair in ranked.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            assert!(
                perms(lower).is_subset(perms(higher)),
                "{} should include every permission of {}",
                higher,
                lower
            );
            assert!(perms(higher).len() > perms(lower).len());
        }
    }

    #[test]
    fn test_regiment_admin_keeps_member_basics() {
        let admin = perms(Role::RegimentAdmin);
        assert!(admin.contains(&Permission::ViewTasks));
        assert!(admin.contains(&Permission::AcceptTasks));
    }

    #[test]
    fn test_logistics_manager_permissions() {
        let table = RolePermissionMap::global();
        assert!(table.grants(Role::LogisticsManager, Permission::EditSupplyGraph));
        assert!(table.grants(Role::LogisticsManager, Permission::AssignTasks));
        assert!(!table.grants(Role::LogisticsManager, Permission::ManageTenantUsers));
    }

    #[test]
    fn test_global_permissions_only_for_server_admin() {
        let global = [
            Permission::ManageAllTenants,
            Permission::ViewAllTenants,
            Permission::ManageSystemConfig,
        ];
        for role in Role::ALL {
            for permission in global {
                assert_eq!(
                    perms(role).contains(&permission),
                    role == Role::ServerAdmin,
                    "{} / {}",
                    role,
                    permission
                );
            }
        }
    }

    #[test]
    fn test_exact_tiers() {
        let expected = [
            (Role::EndUser, 4),
            (Role::LogisticsManager, 9),
            (Role::RegimentAdmin, 12),
            (Role::ServerAdmin, 15),
        ];
        for (role, count) in expected {
            assert_eq!(perms(role).len(), count, "{}", role);
        }
    }

    #[test]
    fn test_higher_level_never_loses_a_grant() {
        for permission in Permission::ALL {
            let mut granted = false;
            for role in Role::ALL {
                let now = perms(role).contains(&permission);
                assert!(!granted || now, "{} dropped at {}", permission, role);
                granted = now;
            }
        }
    }
}
