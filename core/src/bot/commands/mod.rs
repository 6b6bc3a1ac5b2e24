//! Slash commands
//!
//! Every tenant-scoped command resolves the guild's regiment, builds a
//! [`TenantContext`] for the invoking user and calls `require_permission`
//! before touching any data. Errors bubble up to [`on_error`], which turns
//! tenant errors into user-facing replies.

mod logistics;
mod regiment;

use crate::error::{StoreError, TenantError};
use crate::model::{Faction, NewUser, TaskStatus, User};
use crate::rbac::{AuditLogger, Permission, Role};
use crate::tenant::{Tenant, TenantContext, TenantManager};
use poise::serenity_prelude as serenity;
use tracing::{error, warn};

pub const COLOR_INFO: u32 = 0x5865F2;
pub const COLOR_SUCCESS: u32 = 0x57F287;
pub const COLOR_ERROR: u32 = 0xED4245;

/// Lines shown by list commands
pub(crate) const LIST_LIMIT: usize = 50;
/// Discord rejects longer embed descriptions
const EMBED_DESCRIPTION_LIMIT: usize = 4096;
/// Room kept for the "…and N more" trailer
const OVERFLOW_RESERVE: usize = 32;

/// poise data shared by all commands
pub struct Data {
    pub tenants: TenantManager,
    pub audit: AuditLogger,
}

pub type CommandError = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, CommandError>;

/// Membership roles selectable from Discord
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RoleChoice {
    #[name = "End User"]
    EndUser,
    #[name = "Logistics Manager"]
    LogisticsManager,
    #[name = "Regiment Admin"]
    RegimentAdmin,
}

impl From<RoleChoice> for Role {
    fn from(choice: RoleChoice) -> Self {
        match choice {
            RoleChoice::EndUser => Role::EndUser,
            RoleChoice::LogisticsManager => Role::LogisticsManager,
            RoleChoice::RegimentAdmin => Role::RegimentAdmin,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum FactionChoice {
    #[name = "Colonial"]
    Colonial,
    #[name = "Warden"]
    Warden,
}

impl From<FactionChoice> for Faction {
    fn from(choice: FactionChoice) -> Self {
        match choice {
            FactionChoice::Colonial => Faction::Colonial,
            FactionChoice::Warden => Faction::Warden,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum StatusChoice {
    #[name = "Pending"]
    Pending,
    #[name = "In Progress"]
    InProgress,
    #[name = "Completed"]
    Completed,
    #[name = "Cancelled"]
    Cancelled,
}

impl From<StatusChoice> for TaskStatus {
    fn from(choice: StatusChoice) -> Self {
        match choice {
            StatusChoice::Pending => TaskStatus::Pending,
            StatusChoice::InProgress => TaskStatus::InProgress,
            StatusChoice::Completed => TaskStatus::Completed,
            StatusChoice::Cancelled => TaskStatus::Cancelled,
        }
    }
}

/// Every registered command
pub fn all() -> Vec<poise::Command<Data, CommandError>> {
    vec![
        regiment::setup_regiment(),
        regiment::regiment_info(),
        regiment::add_member(),
        regiment::remove_member(),
        regiment::set_role(),
        regiment::list_members(),
        regiment::my_regiments(),
        regiment::list_regiments(),
        regiment::promote_server_admin(),
        logistics::create_supply_node(),
        logistics::list_supply_nodes(),
        logistics::create_production_node(),
        logistics::list_production_nodes(),
        logistics::create_task(),
        logistics::list_tasks(),
        logistics::accept_task(),
        logistics::complete_task(),
        help(),
    ]
}

/// A resolved, authorized invocation
pub(crate) struct Access {
    pub tenant: Tenant,
    pub user: User,
    pub context: TenantContext,
}

/// Record for a Discord account, created on first sight
pub(crate) async fn user_record(
    tenants: &TenantManager,
    account: &serenity::User,
) -> Result<User, CommandError> {
    let mut new_user = NewUser::new(account.id.to_string(), account.name.clone());
    if let Some(global_name) = &account.global_name {
        new_user = new_user.with_display_name(global_name.clone());
    }
    Ok(tenants.get_or_create_user(new_user).await?)
}

/// The regiment registered for the invoking guild
pub(crate) async fn guild_tenant(ctx: Context<'_>) -> Result<Tenant, CommandError> {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| TenantError::NotFound("direct messages".to_string()))?
        .to_string();
    let tenant = ctx
        .data()
        .tenants
        .get_tenant_by_discord_guild(&guild_id)
        .await?
        .ok_or(TenantError::NotFound(guild_id))?;
    Ok(tenant)
}

/// Resolve tenant and user, then enforce `permission`. Every decision is
/// written to the audit log.
pub(crate) async fn authorize(ctx: Context<'_>, permission: Permission) -> Result<Access, CommandError> {
    let tenant = guild_tenant(ctx).await?;
    let user = user_record(&ctx.data().tenants, ctx.author()).await?;
    let context = ctx.data().tenants.context_for(&tenant, &user).await?;

    let decision = context.require_permission(permission);
    ctx.data().audit.log(
        tenant.slug(),
        &user.discord_id,
        context.role(),
        permission,
        &ctx.command().name,
        decision.is_ok(),
    );

    if let Err(denied) = decision {
        if context.role().is_none() {
            return Err(TenantError::NotMember(tenant.slug().to_string()).into());
        }
        return Err(denied.into());
    }

    Ok(Access {
        tenant,
        user,
        context,
    })
}

/// Global commands bypass tenants; only server admins may run them.
pub(crate) async fn require_server_admin(
    ctx: Context<'_>,
    permission: Permission,
) -> Result<User, CommandError> {
    let user = user_record(&ctx.data().tenants, ctx.author()).await?;
    let role = user.is_server_admin.then_some(Role::ServerAdmin);
    ctx.data().audit.log(
        "*",
        &user.discord_id,
        role,
        permission,
        &ctx.command().name,
        user.is_server_admin,
    );
    if !user.is_server_admin {
        return Err(TenantError::PermissionDenied {
            permission,
            tenant: "*".to_string(),
        }
        .into());
    }
    Ok(user)
}

pub(crate) fn embed(title: impl Into<String>, color: u32) -> serenity::CreateEmbed {
    serenity::CreateEmbed::default()
        .title(title)
        .color(color)
        .timestamp(serenity::Timestamp::now())
}

/// Newline-joined `lines` for an embed description. Stops after
/// `max_items` lines or before the description limit, and then notes how
/// many were left out.
pub(crate) fn list_body(lines: Vec<String>, max_items: usize, empty: &str) -> String {
    if lines.is_empty() {
        return empty.to_string();
    }

    let mut body = String::new();
    let mut used = 0;
    let mut shown = 0;
    for line in &lines {
        if shown == max_items {
            break;
        }
        let cost = line.chars().count() + usize::from(shown > 0);
        if used + cost + OVERFLOW_RESERVE > EMBED_DESCRIPTION_LIMIT {
            break;
        }
        if shown > 0 {
            body.push('\n');
        }
        body.push_str(line);
        used += cost;
        shown += 1;
    }

    let hidden = lines.len() - shown;
    if hidden > 0 {
        if shown > 0 {
            body.push('\n');
        }
        body.push_str(&format!("…and {} more", hidden));
    }
    body
}

pub(crate) async fn reply(ctx: Context<'_>, embed: serenity::CreateEmbed) -> Result<(), CommandError> {
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Posted when the bot joins a guild without a regiment
pub fn welcome_embed() -> serenity::CreateEmbed {
    embed("Foxhole Quartermaster", COLOR_INFO)
        .description("Thanks for adding the quartermaster! This server has no regiment yet.")
        .field(
            "Getting started",
            "1. A server manager runs `/setup_regiment`\n\
             2. Add members with `/add_member`\n\
             3. Map your logistics with `/create_supply_node` and `/create_task`",
            false,
        )
        .field("Help", "Run `/help` for every command.", false)
}

/// Text shown to the user for an error, or `None` for internal failures
pub fn user_message(error: &CommandError) -> Option<String> {
    let tenant_error = error.downcast_ref::<TenantError>()?;
    let message = match tenant_error {
        TenantError::NotFound(_) => {
            "This server has no regiment registered. A server manager can run `/setup_regiment`."
                .to_string()
        }
        TenantError::AlreadyExists { slug, .. } => format!(
            "Could not register: the slug `{}` is taken or this server already has a regiment.",
            slug
        ),
        TenantError::NotMember(slug) => format!("You are not a member of **{}**.", slug),
        TenantError::PermissionDenied { permission, .. } => {
            format!("You need the `{}` permission to do that.", permission)
        }
        TenantError::InvalidRole(role) => {
            format!("{} cannot be assigned inside a regiment.", role.display_name())
        }
        TenantError::InvalidSlug(slug) => format!(
            "`{}` is not a valid slug. Use lowercase letters, digits and hyphens (max 50, not all digits).",
            slug
        ),
        TenantError::InvalidTransition(reason) => format!("Can't do that: {}.", reason),
        TenantError::Store(StoreError::Conflict(_)) => {
            "Something with that name already exists in this regiment.".to_string()
        }
        TenantError::Store(StoreError::NotFound(what)) => format!("Not found: {}.", what),
        TenantError::Store(StoreError::Unexpected(_)) => return None,
    };
    Some(message)
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, CommandError>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = match user_message(&error) {
                Some(message) => {
                    warn!("/{} rejected: {}", ctx.command().name, error);
                    message
                }
                None => {
                    error!("/{} failed: {}", ctx.command().name, error);
                    "Something went wrong while running that command.".to_string()
                }
            };
            let reply = poise::CreateReply::default()
                .embed(embed("Error", COLOR_ERROR).description(message))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("failed to send error reply: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("error while handling error: {}", e);
            }
        }
    }
}

/// show help information
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), CommandError> {
    let help = embed("Quartermaster commands", COLOR_INFO)
        .field(
            "Regiment",
            "`/setup_regiment` register this server (Manage Server)\n\
             `/regiment_info` show the regiment\n\
             `/add_member` `/remove_member` `/set_role` manage members\n\
             `/list_members` list members\n\
             `/my_regiments` regiments you belong to",
            false,
        )
        .field(
            "Logistics",
            "`/create_supply_node` `/list_supply_nodes`\n\
             `/create_production_node` `/list_production_nodes`\n\
             `/create_task` `/list_tasks` `/accept_task` `/complete_task`",
            false,
        )
        .field(
            "Server admins",
            "`/list_regiments` `/promote_server_admin`",
            false,
        );
    ctx.send(poise::CreateReply::default().embed(help).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_for_tenant_errors() {
        let err: CommandError = Box::new(TenantError::PermissionDenied {
            permission: Permission::EditSupplyGraph,
            tenant: "alpha".to_string(),
        });
        assert_eq!(
            user_message(&err).unwrap(),
            "You need the `edit_supply_graph` permission to do that."
        );

        let err: CommandError = Box::new(TenantError::NotMember("alpha".to_string()));
        assert!(user_message(&err).unwrap().contains("**alpha**"));
    }

    #[test]
    fn test_internal_errors_stay_generic() {
        let err: CommandError = Box::new(TenantError::Store(StoreError::Unexpected(
            anyhow::anyhow!("disk full"),
        )));
        assert!(user_message(&err).is_none());

        let err: CommandError = "plain failure".into();
        assert!(user_message(&err).is_none());
    }

    #[test]
    fn test_role_choices_are_assignable() {
        for choice in [
            RoleChoice::EndUser,
            RoleChoice::LogisticsManager,
            RoleChoice::RegimentAdmin,
        ] {
            assert!(Role::from(choice).is_assignable());
        }
    }

    #[test]
    fn test_list_body_fits_embed() {
        let lines: Vec<_> = (0..200)
            .map(|i| format!("• member-{:03} with a fairly long name (Logistics Manager)", i))
            .collect();
        let body = list_body(lines, usize::MAX, "none");

        assert!(body.chars().count() <= EMBED_DESCRIPTION_LIMIT);
        assert!(body.starts_with("• member-000"));
        let shown = body.lines().filter(|l| l.starts_with('•')).count();
        assert!(body.ends_with(&format!("…and {} more", 200 - shown)));
    }

    #[test]
    fn test_list_body_item_cap_and_empty() {
        let lines: Vec<_> = (0..25).map(|i| format!("• task {}", i)).collect();
        let body = list_body(lines, 20, "No tasks.");
        assert_eq!(body.lines().count(), 21);
        assert_eq!(body.lines().last(), Some("…and 5 more"));

        let short = list_body(vec!["• a".to_string(), "• b".to_string()], 20, "none");
        assert_eq!(short, "• a\n• b");

        assert_eq!(list_body(Vec::new(), 20, "No tasks."), "No tasks.");
    }

    #[test]
    fn test_all_commands_registered() {
        let names: Vec<_> = all().into_iter().map(|c| c.name).collect();
        assert!(names.iter().any(|n| n == "setup_regiment"));
        assert!(names.iter().any(|n| n == "accept_task"));
        assert_eq!(names.len(), 18);
    }
}
