//! Regiment registration and membership commands

use super::{
    COLOR_INFO, COLOR_SUCCESS, CommandError, Context, FactionChoice, LIST_LIMIT, RoleChoice,
    authorize, embed, list_body, reply, require_server_admin, user_record,
};
use crate::error::TenantError;
use crate::model::NewTenant;
use crate::rbac::{Permission, Role};
use poise::serenity_prelude as serenity;
use tracing::info;

/// register this server as a regiment
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn setup_regiment(
    ctx: Context<'_>,
    #[description = "Regiment name"] name: String,
    #[description = "Short identifier: lowercase letters, digits and hyphens, not all digits"] slug: String,
    #[description = "Faction"] faction: Option<FactionChoice>,
) -> Result<(), CommandError> {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| TenantError::NotFound("direct messages".to_string()))?;
    let creator = user_record(&ctx.data().tenants, ctx.author()).await?;

    let mut new_tenant = NewTenant::new(name, slug, guild_id.to_string());
    if let Some(faction) = faction {
        new_tenant = new_tenant.with_faction(faction.into());
    }
    let tenant = ctx.data().tenants.create_tenant(new_tenant, &creator).await?;
    info!(
        "{} registered regiment {} for guild {}",
        creator.username,
        tenant.slug(),
        guild_id
    );

    let faction = tenant
        .record()
        .faction
        .map(|f| f.as_str().to_string())
        .unwrap_or_else(|| "unaligned".to_string());
    reply(
        ctx,
        embed("Regiment registered", COLOR_SUCCESS)
            .description(format!("**{}** is ready for logistics.", tenant.name()))
            .field("Slug", tenant.slug(), true)
            .field("Faction", faction, true)
            .field("Your role", Role::RegimentAdmin.display_name(), true),
    )
    .await
}

/// show this server's regiment
#[poise::command(slash_command, guild_only)]
pub async fn regiment_info(ctx: Context<'_>) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ViewTasks).await?;
    let record = access.tenant.record();
    let members = access.tenant.list_members().await?;

    let mut info = embed(&record.name, COLOR_INFO)
        .field("Slug", &record.slug, true)
        .field("Members", members.len().to_string(), true)
        .field(
            "Created",
            record.created_at.format("%Y-%m-%d").to_string(),
            true,
        );
    if let Some(faction) = record.faction {
        info = info.field("Faction", faction.as_str(), true);
    }
    if let Some(description) = &record.description {
        info = info.description(description);
    }
    if let Some(role) = access.context.role() {
        info = info.field("Your role", role.display_name(), true);
    }
    reply(ctx, info).await
}

/// add a user to this regiment
#[poise::command(slash_command, guild_only)]
pub async fn add_member(
    ctx: Context<'_>,
    #[description = "User to add"] user: serenity::User,
    #[description = "Role in the regiment"] role: RoleChoice,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ManageTenantUsers).await?;
    let member = user_record(&ctx.data().tenants, &user).await?;
    let role = Role::from(role);

    if !access.tenant.add_member(&member, role).await? {
        ctx.say(format!("{} is already a member.", member.label()))
            .await?;
        return Ok(());
    }
    reply(
        ctx,
        embed("Member added", COLOR_SUCCESS).description(format!(
            "{} joined **{}** as {}.",
            member.label(),
            access.tenant.name(),
            role.display_name()
        )),
    )
    .await
}

/// remove a user from this regiment
#[poise::command(slash_command, guild_only)]
pub async fn remove_member(
    ctx: Context<'_>,
    #[description = "User to remove"] user: serenity::User,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ManageTenantUsers).await?;
    let member = user_record(&ctx.data().tenants, &user).await?;

    if !access.tenant.remove_member(&member).await? {
        ctx.say(format!("{} is not a member.", member.label()))
            .await?;
        return Ok(());
    }
    reply(
        ctx,
        embed("Member removed", COLOR_SUCCESS).description(format!(
            "{} left **{}**.",
            member.label(),
            access.tenant.name()
        )),
    )
    .await
}

/// change a member's role
#[poise::command(slash_command, guild_only)]
pub async fn set_role(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
    #[description = "New role"] role: RoleChoice,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ManageTenantRoles).await?;
    let member = user_record(&ctx.data().tenants, &user).await?;
    let role = Role::from(role);

    if !access.tenant.update_member_role(&member, role).await? {
        ctx.say(format!("{} is not a member.", member.label()))
            .await?;
        return Ok(());
    }
    reply(
        ctx,
        embed("Role updated", COLOR_SUCCESS)
            .description(format!("{} is now {}.", member.label(), role.display_name())),
    )
    .await
}

/// list regiment members
#[poise::command(slash_command, guild_only)]
pub async fn list_members(ctx: Context<'_>) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ViewTenantData).await?;
    let members = access.tenant.list_members().await?;

    let body = list_body(
        members
            .iter()
            .map(|m| format!("• {} ({})", m.label(), m.role.display_name()))
            .collect(),
        LIST_LIMIT,
        "No members yet.",
    );
    reply(
        ctx,
        embed(format!("{} members", access.tenant.name()), COLOR_INFO).description(body),
    )
    .await
}

/// regiments you belong to
#[poise::command(slash_command)]
pub async fn my_regiments(ctx: Context<'_>) -> Result<(), CommandError> {
    let user = user_record(&ctx.data().tenants, ctx.author()).await?;
    let tenants = ctx.data().tenants.list_user_tenants(&user).await?;

    let body = list_body(
        tenants
            .iter()
            .map(|(tenant, role)| format!("• **{}** ({})", tenant.name(), role.display_name()))
            .collect(),
        LIST_LIMIT,
        "You are not a member of any regiment.",
    );
    ctx.send(
        poise::CreateReply::default()
            .embed(embed("Your regiments", COLOR_INFO).description(body))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// list every regiment (server admins)
#[poise::command(slash_command)]
pub async fn list_regiments(ctx: Context<'_>) -> Result<(), CommandError> {
    require_server_admin(ctx, Permission::ViewAllTenants).await?;
    let tenants = ctx.data().tenants.list_tenants().await?;

    let body = list_body(
        tenants
            .iter()
            .map(|t| format!("• **{}** `{}` guild {}", t.name(), t.slug(), t.guild_id()))
            .collect(),
        LIST_LIMIT,
        "No regiments registered.",
    );
    reply(ctx, embed("Regiments", COLOR_INFO).description(body)).await
}

/// grant server admin to a user (server admins)
#[poise::command(slash_command)]
pub async fn promote_server_admin(
    ctx: Context<'_>,
    #[description = "User to promote"] user: serenity::User,
) -> Result<(), CommandError> {
    let admin = require_server_admin(ctx, Permission::ManageAllTenants).await?;
    let target = user_record(&ctx.data().tenants, &user).await?;
    ctx.data()
        .tenants
        .set_server_admin(&target.discord_id, true)
        .await?;
    info!("{} promoted {} to server admin", admin.username, target.username);

    reply(
        ctx,
        embed("Server admin granted", COLOR_SUCCESS)
            .description(format!("{} is now a server admin.", target.label())),
    )
    .await
}
