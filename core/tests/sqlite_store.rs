//! Tenant scenarios against the SQLite backend

use quartermaster_core::store::TenantStore;
use quartermaster_core::{
    Faction, NewLogisticsTask, NewProductionNode, NewSupplyNode, NewTenant, NewUser, Permission,
    Role, SqliteStore, StoreError, TaskStatus, Tenant, TenantError, TenantManager, User,
};
use std::sync::Arc;

async fn manager() -> TenantManager {
    let store = SqliteStore::connect_in_memory().await.unwrap();
    TenantManager::new(Arc::new(store))
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
async fn test_store_health() {
    let manager = manager().await;
    let store = manager.store();
    store.health_check().await.unwrap();
    assert_eq!(store.backend_name(), "sqlite");
    assert!(store.is_durable());
}

#[tokio::test]
async fn test_tenant_round_trip() {
    let manager = manager().await;
    let creator = user(&manager, "100").await;

    let tenant = manager
        .create_tenant(
            NewTenant::new("Night Owls", "night-owls", "555")
                .with_faction(Faction::Warden)
                .with_description("Northern logi"),
            &creator,
        )
        .await
        .unwrap();

    let loaded = manager.get_tenant_by_slug("night-owls").await.unwrap().unwrap();
    assert_eq!(loaded.id(), tenant.id());
    assert_eq!(loaded.name(), "Night Owls");
    assert_eq!(loaded.record().faction, Some(Faction::Warden));
    assert_eq!(loaded.record().description.as_deref(), Some("Northern logi"));
    assert_eq!(
        loaded.get_user_role(&creator).await.unwrap(),
        Some(Role::RegimentAdmin)
    );

    let by_guild = manager.resolve_tenant("555").await.unwrap().unwrap();
    assert_eq!(by_guild.id(), tenant.id());
}

#[tokio::test]
async fn test_duplicate_slug_and_guild_conflict() {
    let manager = manager().await;
    let creator = user(&manager, "100").await;
    regiment(&manager, "alpha", "1", &creator).await;

    let same_slug = manager
        .create_tenant(NewTenant::new("Other", "alpha", "2"), &creator)
        .await;
    assert!(matches!(same_slug, Err(TenantError::AlreadyExists { .. })));

    let same_guild = manager
        .create_tenant(NewTenant::new("Other", "beta", "1"), &creator)
        .await;
    assert!(matches!(same_guild, Err(TenantError::AlreadyExists { .. })));

    assert_eq!(manager.list_tenants().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_users_are_created_once() {
    let manager = manager().await;
    let first = user(&manager, "42").await;
    let again = manager
        .get_or_create_user(NewUser::new("42", "renamed"))
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.username, "user-42");
}

#[tokio::test]
async fn test_membership_dedup_and_role_change() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let member = user(&manager, "2").await;
    let tenant = regiment(&manager, "alpha", "10", &admin).await;

    assert!(tenant.add_member(&member, Role::EndUser).await.unwrap());
    assert!(!tenant.add_member(&member, Role::RegimentAdmin).await.unwrap());
    assert_eq!(
        tenant.get_user_role(&member).await.unwrap(),
        Some(Role::EndUser)
    );

    assert!(
        tenant
            .update_member_role(&member, Role::LogisticsManager)
            .await
            .unwrap()
    );
    assert!(
        tenant
            .has_permission(&member, Permission::EditSupplyGraph)
            .await
            .unwrap()
    );

    assert!(tenant.remove_member(&member).await.unwrap());
    assert!(!tenant.remove_member(&member).await.unwrap());
    assert_eq!(tenant.get_user_role(&member).await.unwrap(), None);
}

#[tokio::test]
async fn test_user_tenants_listing() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let member = user(&manager, "2").await;
    let alpha = regiment(&manager, "alpha", "10", &admin).await;
    regiment(&manager, "bravo", "20", &admin).await;
    alpha.add_member(&member, Role::LogisticsManager).await.unwrap();

    let mine = manager.list_user_tenants(&member).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].0.slug(), "alpha");
    assert_eq!(mine[0].1, Role::LogisticsManager);

    assert_eq!(manager.list_user_tenants(&admin).await.unwrap().len(), 2);

    let members = alpha.list_members().await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.discord_id == "2"));
}

#[tokio::test]
async fn test_server_admin_flag_persists() {
    let manager = manager().await;
    let admin = manager.ensure_server_admin("999").await.unwrap();
    assert!(admin.is_server_admin);

    let reloaded = manager.find_user("999").await.unwrap().unwrap();
    assert!(reloaded.is_server_admin);

    assert!(manager.set_server_admin("999", false).await.unwrap());
    assert!(!manager.find_user("999").await.unwrap().unwrap().is_server_admin);
    assert!(!manager.set_server_admin("unknown", true).await.unwrap());

    manager.ensure_server_admin("999").await.unwrap();
    assert_eq!(manager.revoke_server_admin("999").await.unwrap(), Some(true));
    assert_eq!(manager.revoke_server_admin("999").await.unwrap(), Some(false));
    assert_eq!(manager.revoke_server_admin("unknown").await.unwrap(), None);
}

#[tokio::test]
async fn test_nodes_are_isolated_per_tenant() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let alpha = regiment(&manager, "alpha", "10", &admin).await;
    let bravo = regiment(&manager, "bravo", "20", &admin).await;

    alpha
        .create_supply_node(NewSupplyNode::new("Depot", "Deadlands", "depot"))
        .await
        .unwrap();
    bravo
        .create_supply_node(NewSupplyNode::new("Depot", "Westgate", "depot"))
        .await
        .unwrap();
    alpha
        .create_production_node(NewProductionNode::new("MPF", "Deadlands", "mpf"))
        .await
        .unwrap();

    let dup = alpha
        .create_supply_node(NewSupplyNode::new("Depot", "Elsewhere", "stockpile"))
        .await;
    assert!(matches!(dup, Err(TenantError::Store(StoreError::Conflict(_)))));

    let alpha_nodes = alpha.get_supply_nodes().await.unwrap();
    assert_eq!(alpha_nodes.len(), 1);
    assert_eq!(alpha_nodes[0].location, "Deadlands");
    assert_eq!(bravo.get_supply_nodes().await.unwrap()[0].location, "Westgate");
    assert_eq!(alpha.get_production_nodes().await.unwrap().len(), 1);
    assert!(bravo.get_production_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_lifecycle() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let runner = user(&manager, "2").await;
    let tenant = regiment(&manager, "alpha", "10", &admin).await;
    tenant.add_member(&runner, Role::EndUser).await.unwrap();

    let low = tenant
        .create_task(NewLogisticsTask::new("Scrap run", "scrap").with_priority(1), &admin)
        .await
        .unwrap();
    let high = tenant
        .create_task(
            NewLogisticsTask::new("Deliver shirts", "delivery")
                .with_description("200 crates to the front")
                .with_priority(5),
            &admin,
        )
        .await
        .unwrap();

    let tasks = tenant.get_tasks(None).await.unwrap();
    assert_eq!(tasks[0].id, high.id);
    assert_eq!(tasks[1].id, low.id);

    let accepted = tenant.accept_task(high.id, &runner).await.unwrap();
    assert_eq!(accepted.status, TaskStatus::InProgress);
    assert_eq!(accepted.assigned_to, Some(runner.id));

    let again = tenant.accept_task(high.id, &admin).await;
    assert!(matches!(again, Err(TenantError::InvalidTransition(_))));

    let done = tenant.complete_task(high.id).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_at.is_some());

    let pending = tenant.get_tasks(Some(TaskStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, low.id);

    let fetched = tenant.get_task(high.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_task_from_other_tenant_is_not_found() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let alpha = regiment(&manager, "alpha", "10", &admin).await;
    let bravo = regiment(&manager, "bravo", "20", &admin).await;

    let task = alpha
        .create_task(NewLogisticsTask::new("Haul", "delivery"), &admin)
        .await
        .unwrap();

    assert!(bravo.get_task(task.id).await.unwrap().is_none());
    let result = bravo.accept_task(task.id, &admin).await;
    assert!(matches!(result, Err(TenantError::Store(StoreError::NotFound(_)))));
}

#[tokio::test]
async fn test_config_update_persists() {
    let manager = manager().await;
    let admin = user(&manager, "1").await;
    let mut tenant = regiment(&manager, "alpha", "10", &admin).await;

    tenant
        .update_config(serde_json::json!({ "stockpile_alerts": true }))
        .await
        .unwrap();

    let reloaded = manager.get_tenant_by_slug("alpha").await.unwrap().unwrap();
    assert_eq!(reloaded.config()["stockpile_alerts"], true);
}
