//! Scenario tests for tenants, memberships and contexts

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::{StoreError, TenantError};
    use crate::model::{
        Faction, NewLogisticsTask, NewSupplyNode, NewTenant, NewUser, TaskStatus, User,
    };
    use crate::rbac::{Permission, Role, permissions_for};
    use crate::store::InMemoryStore;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn manager() -> TenantManager {
        TenantManager::new(Arc::new(InMemoryStore::new()))
    }

    async fn user(manager: &TenantManager, discord_id: &str) -> User {
        manager
            .get_or_create_user(NewUser::new(discord_id, format!("user-{}", discord_id)))
            .await
            .unwrap()
    }

    async fn regiment(manager: &TenantManager, slug: &str, guild: &str, creator: &User) -> Tenant {
        manager
            .create_tenant(NewTenant::new(slug.to_uppercase(), slug, guild), creator)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_tenant_scenario() {
        let manager = manager();
        let creator = user(&manager, "123456789").await;

        let tenant = manager
            .create_tenant(
                NewTenant::new("Test Regiment", "test-regiment", "987654321")
                    .with_faction(Faction::Colonial),
                &creator,
            )
            .await
            .unwrap();

        assert_eq!(tenant.name(), "Test Regiment");
        assert_eq!(tenant.record().faction, Some(Faction::Colonial));
        assert_eq!(
            tenant.get_user_role(&creator).await.unwrap(),
            Some(Role::RegimentAdmin)
        );

        let by_slug = manager.get_tenant_by_slug("test-regiment").await.unwrap().unwrap();
        assert_eq!(by_slug.id(), tenant.id());
        let by_guild = manager
            .get_tenant_by_discord_guild("987654321")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_guild.id(), tenant.id());

        assert!(manager.get_tenant_by_slug("missing").await.unwrap().is_none());
        assert!(manager.get_tenant_by_discord_guild("0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tenant_rejected() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        regiment(&manager, "alpha", "100", &creator).await;

        let err = manager
            .create_tenant(NewTenant::new("Other", "alpha", "200"), &creator)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::AlreadyExists { ref slug, .. } if slug == "alpha"));

        let err = manager
            .create_tenant(NewTenant::new("Other", "beta", "100"), &creator)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::AlreadyExists { ref guild_id, .. } if guild_id == "100"));
    }

    #[tokio::test]
    async fn test_invalid_slug_rejected() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let err = manager
            .create_tenant(NewTenant::new("Bad", "Bad Slug", "100"), &creator)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::InvalidSlug(_)));
        assert!(manager.list_tenants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_numeric_slug_cannot_shadow_guild() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let bravo = regiment(&manager, "bravo", "200", &creator).await;

        let err = manager
            .create_tenant(NewTenant::new("Alpha", "200", "100"), &creator)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::InvalidSlug(ref slug) if slug == "200"));

        let ctx = manager.create_tenant_context("200", &creator).await.unwrap();
        assert_eq!(ctx.tenant_id(), bravo.id());
    }

    #[tokio::test]
    async fn test_duplicate_add_member_keeps_first_role() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let member = user(&manager, "2").await;

        assert!(tenant.add_member(&member, Role::EndUser).await.unwrap());
        assert!(!tenant.add_member(&member, Role::RegimentAdmin).await.unwrap());
        assert_eq!(tenant.get_user_role(&member).await.unwrap(), Some(Role::EndUser));
    }

    #[tokio::test]
    async fn test_server_admin_is_not_a_membership_role() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let member = user(&manager, "2").await;

        let err = tenant.add_member(&member, Role::ServerAdmin).await.unwrap_err();
        assert!(matches!(err, TenantError::InvalidRole(Role::ServerAdmin)));
        let err = tenant
            .update_member_role(&creator, Role::ServerAdmin)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_remove_and_update_report_absence() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let stranger = user(&manager, "2").await;

        assert!(!tenant.remove_member(&stranger).await.unwrap());
        assert!(!tenant.update_member_role(&stranger, Role::EndUser).await.unwrap());

        tenant.add_member(&stranger, Role::EndUser).await.unwrap();
        assert!(tenant
            .update_member_role(&stranger, Role::LogisticsManager)
            .await
            .unwrap());
        assert_eq!(
            tenant.get_user_role(&stranger).await.unwrap(),
            Some(Role::LogisticsManager)
        );
        assert!(tenant.remove_member(&stranger).await.unwrap());
        assert_eq!(tenant.get_user_role(&stranger).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_member_has_no_permissions() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let stranger = user(&manager, "2").await;

        for permission in Permission::ALL {
            assert!(!tenant.has_permission(&stranger, permission).await.unwrap());
        }
        let err = tenant
            .require_permission(&stranger, Permission::ViewTasks)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::NotMember(_)));

        let ctx = manager.create_tenant_context("alpha", &stranger).await.unwrap();
        assert_eq!(ctx.user_id(), Some(stranger.id));
        assert_eq!(ctx.role(), None);
        assert!(ctx.permissions().is_empty());
    }

    #[tokio::test]
    async fn test_member_permissions_follow_role() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let member = user(&manager, "2").await;
        tenant.add_member(&member, Role::EndUser).await.unwrap();

        assert!(tenant.has_permission(&member, Permission::AcceptTasks).await.unwrap());
        assert!(!tenant.has_permission(&member, Permission::EditSupplyGraph).await.unwrap());
        let err = tenant
            .require_permission(&member, Permission::ManageTenantUsers)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TenantError::PermissionDenied { permission: Permission::ManageTenantUsers, .. }
        ));

        let ctx = manager.create_tenant_context("100", &member).await.unwrap();
        assert_eq!(ctx.role(), Some(Role::EndUser));
        assert_eq!(ctx.permissions(), permissions_for(Role::EndUser));
    }

    #[tokio::test]
    async fn test_server_admin_bypass_without_membership() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let admin = manager.ensure_server_admin("999").await.unwrap();
        assert!(admin.is_server_admin);

        for permission in Permission::ALL {
            assert!(tenant.has_permission(&admin, permission).await.unwrap());
        }
        tenant
            .require_permission(&admin, Permission::ManageTenant)
            .await
            .unwrap();

        let ctx = manager.create_tenant_context("alpha", &admin).await.unwrap();
        assert_eq!(ctx.role(), Some(Role::ServerAdmin));
        assert_eq!(ctx.permissions().len(), Permission::ALL.len());
    }

    #[tokio::test]
    async fn test_server_admin_member_keeps_role_and_full_permissions() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        let admin = manager.ensure_server_admin("999").await.unwrap();
        tenant.add_member(&admin, Role::EndUser).await.unwrap();

        let ctx = manager.create_tenant_context("alpha", &admin).await.unwrap();
        assert_eq!(ctx.role(), Some(Role::EndUser));
        assert!(ctx.has_permission(Permission::ManageAllTenants));
    }

    #[tokio::test]
    async fn test_context_for_unknown_tenant() {
        let manager = manager();
        let someone = user(&manager, "1").await;
        let err = manager
            .create_tenant_context("missing", &someone)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::NotFound(ref key) if key == "missing"));
    }

    #[tokio::test]
    async fn test_set_server_admin_unknown_user() {
        let manager = manager();
        assert!(!manager.set_server_admin("404", true).await.unwrap());
        let known = user(&manager, "1").await;
        assert!(manager.set_server_admin(&known.discord_id, true).await.unwrap());
        let reloaded = manager.find_user("1").await.unwrap().unwrap();
        assert!(reloaded.is_server_admin);
    }

    #[tokio::test]
    async fn test_revoke_server_admin_outcomes() {
        let manager = manager();
        assert_eq!(manager.revoke_server_admin("404").await.unwrap(), None);

        user(&manager, "1").await;
        assert_eq!(manager.revoke_server_admin("1").await.unwrap(), Some(false));

        manager.ensure_server_admin("1").await.unwrap();
        assert_eq!(manager.revoke_server_admin("1").await.unwrap(), Some(true));
        assert!(!manager.find_user("1").await.unwrap().unwrap().is_server_admin);
    }

    #[tokio::test]
    async fn test_list_user_tenants_and_members() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let member = user(&manager, "2").await;
        let alpha = regiment(&manager, "alpha", "100", &creator).await;
        let bravo = regiment(&manager, "bravo", "200", &creator).await;
        bravo.add_member(&member, Role::LogisticsManager).await.unwrap();

        let mine = manager.list_user_tenants(&creator).await.unwrap();
        let slugs: Vec<_> = mine.iter().map(|(t, _)| t.slug().to_string()).collect();
        assert_eq!(slugs, vec!["alpha", "bravo"]);
        assert!(mine.iter().all(|(_, role)| *role == Role::RegimentAdmin));

        let theirs = manager.list_user_tenants(&member).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].1, Role::LogisticsManager);

        assert_eq!(alpha.list_members().await.unwrap().len(), 1);
        let managers = bravo.members_with_role(Role::LogisticsManager).await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].discord_id, "2");
    }

    #[tokio::test]
    async fn test_update_config() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let mut tenant = regiment(&manager, "alpha", "100", &creator).await;

        tenant
            .update_config(serde_json::json!({"default_priority": 2}))
            .await
            .unwrap();
        assert_eq!(tenant.config()["default_priority"], 2);

        let reloaded = manager.get_tenant_by_slug("alpha").await.unwrap().unwrap();
        assert_eq!(reloaded.config()["default_priority"], 2);
    }

    #[tokio::test]
    async fn test_supply_node_names_unique_per_tenant() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let alpha = regiment(&manager, "alpha", "100", &creator).await;
        let bravo = regiment(&manager, "bravo", "200", &creator).await;

        let node = NewSupplyNode::new("Depot", "Deadlands", "depot");
        alpha.create_supply_node(node.clone()).await.unwrap();
        bravo.create_supply_node(node.clone()).await.unwrap();
        let err = alpha.create_supply_node(node).await.unwrap_err();
        assert!(matches!(err, TenantError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let hauler = user(&manager, "2").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;
        tenant.add_member(&hauler, Role::EndUser).await.unwrap();

        let low = tenant
            .create_task(NewLogisticsTask::new("Scrap run", "scrap"), &creator)
            .await
            .unwrap();
        let high = tenant
            .create_task(
                NewLogisticsTask::new("Deliver shirts", "delivery")
                    .with_description("Front needs soldier supplies")
                    .with_priority(5),
                &creator,
            )
            .await
            .unwrap();

        let pending = tenant.get_tasks(Some(TaskStatus::Pending)).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![high.id, low.id]);

        let accepted = tenant.accept_task(high.id, &hauler).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);
        assert_eq!(accepted.assigned_to, Some(hauler.id));

        let err = tenant.accept_task(high.id, &creator).await.unwrap_err();
        assert!(matches!(err, TenantError::InvalidTransition(_)));

        let done = tenant.complete_task(high.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let err = tenant.accept_task(uuid::Uuid::new_v4(), &hauler).await.unwrap_err();
        assert!(matches!(err, TenantError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tasks_are_tenant_scoped() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let alpha = regiment(&manager, "alpha", "100", &creator).await;
        let bravo = regiment(&manager, "bravo", "200", &creator).await;

        let task = alpha
            .create_task(NewLogisticsTask::new("Haul", "delivery"), &creator)
            .await
            .unwrap();
        assert!(bravo.get_tasks(None).await.unwrap().is_empty());
        let err = bravo.accept_task(task.id, &creator).await.unwrap_err();
        assert!(matches!(err, TenantError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_task_assignee_must_be_member() {
        let manager = manager();
        let creator = user(&manager, "1").await;
        let outsider = user(&manager, "2").await;
        let tenant = regiment(&manager, "alpha", "100", &creator).await;

        let err = tenant
            .create_task(
                NewLogisticsTask::new("Haul", "delivery").assigned_to(outsider.id),
                &creator,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TenantError::NotMember(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn supply_nodes_stay_in_their_tenant(n1 in 0usize..6, n2 in 0usize..6) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let (a_nodes, b_nodes) = runtime.block_on(async {
                let manager = manager();
                let creator = user(&manager, "1").await;
                let a = regiment(&manager, "alpha", "100", &creator).await;
                let b = regiment(&manager, "bravo", "200", &creator).await;
                for i in 0..n1 {
                    a.create_supply_node(NewSupplyNode::new(format!("a{i}"), "Westgate", "depot"))
                        .await
                        .unwrap();
                }
                for i in 0..n2 {
                    b.create_supply_node(NewSupplyNode::new(format!("b{i}"), "Callahan", "stockpile"))
                        .await
                        .unwrap();
                }
                (a.get_supply_nodes().await.unwrap(), b.get_supply_nodes().await.unwrap())
            });

            prop_assert_eq!(a_nodes.len(), n1);
            prop_assert_eq!(b_nodes.len(), n2);
            let a_ids: HashSet<_> = a_nodes.iter().map(|n| n.id).collect();
            prop_assert!(b_nodes.iter().all(|n| !a_ids.contains(&n.id)));
        }
    }
}
