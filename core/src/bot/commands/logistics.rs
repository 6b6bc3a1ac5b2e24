//! Supply graph, production graph and task commands

use super::{
    COLOR_INFO, COLOR_SUCCESS, CommandError, Context, LIST_LIMIT, StatusChoice, authorize, embed,
    list_body, reply, user_record,
};
use crate::error::{StoreError, TenantError};
use crate::model::{LogisticsTask, NewLogisticsTask, NewProductionNode, NewSupplyNode};
use crate::rbac::Permission;
use poise::serenity_prelude as serenity;
use uuid::Uuid;

const TASK_LIST_LIMIT: usize = 20;

/// add a supply node (stockpile, depot, ...)
#[poise::command(slash_command, guild_only)]
pub async fn create_supply_node(
    ctx: Context<'_>,
    #[description = "Node name"] name: String,
    #[description = "Map location"] location: String,
    #[description = "Node type, e.g. stockpile or depot"] node_type: String,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::EditSupplyGraph).await?;
    let node = access
        .tenant
        .create_supply_node(NewSupplyNode::new(name, location, node_type))
        .await?;
    reply(
        ctx,
        embed("Supply node created", COLOR_SUCCESS)
            .field("Name", &node.name, true)
            .field("Location", &node.location, true)
            .field("Type", &node.node_type, true),
    )
    .await
}

/// list supply nodes
#[poise::command(slash_command, guild_only)]
pub async fn list_supply_nodes(ctx: Context<'_>) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ViewTenantData).await?;
    let nodes = access.tenant.get_supply_nodes().await?;

    let body = list_body(
        nodes
            .iter()
            .map(|n| format!("• **{}** {} ({})", n.name, n.location, n.node_type))
            .collect(),
        LIST_LIMIT,
        "No supply nodes yet.",
    );
    reply(ctx, embed("Supply nodes", COLOR_INFO).description(body)).await
}

/// add a production facility
#[poise::command(slash_command, guild_only)]
pub async fn create_production_node(
    ctx: Context<'_>,
    #[description = "Facility name"] name: String,
    #[description = "Map location"] location: String,
    #[description = "Facility type, e.g. factory or refinery"] facility_type: String,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::EditProductionGraph).await?;
    let node = access
        .tenant
        .create_production_node(NewProductionNode::new(name, location, facility_type))
        .await?;
    reply(
        ctx,
        embed("Production node created", COLOR_SUCCESS)
            .field("Name", &node.name, true)
            .field("Location", &node.location, true)
            .field("Facility", &node.facility_type, true),
    )
    .await
}

/// list production facilities
#[poise::command(slash_command, guild_only)]
pub async fn list_production_nodes(ctx: Context<'_>) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ViewTenantData).await?;
    let nodes = access.tenant.get_production_nodes().await?;

    let body = list_body(
        nodes
            .iter()
            .map(|n| format!("• **{}** {} ({})", n.name, n.location, n.facility_type))
            .collect(),
        LIST_LIMIT,
        "No production nodes yet.",
    );
    reply(ctx, embed("Production nodes", COLOR_INFO).description(body)).await
}

/// create a logistics task
#[poise::command(slash_command, guild_only)]
pub async fn create_task(
    ctx: Context<'_>,
    #[description = "Short title"] title: String,
    #[description = "What needs doing"] description: String,
    #[description = "Task type, e.g. delivery or scrap"] task_type: String,
    #[description = "Priority, higher first"] priority: Option<i32>,
    #[description = "Assign to a member"] assignee: Option<serenity::User>,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::AssignTasks).await?;

    let mut task = NewLogisticsTask::new(title, task_type)
        .with_description(description)
        .with_priority(priority.unwrap_or_default());
    if let Some(assignee) = &assignee {
        let member = user_record(&ctx.data().tenants, assignee).await?;
        task = task.assigned_to(member.id);
    }

    let task = access.tenant.create_task(task, &access.user).await?;
    reply(ctx, task_embed("Task created", COLOR_SUCCESS, &task)).await
}

/// list logistics tasks
#[poise::command(slash_command, guild_only)]
pub async fn list_tasks(
    ctx: Context<'_>,
    #[description = "Only tasks with this status"] status: Option<StatusChoice>,
) -> Result<(), CommandError> {
    let access = authorize(ctx, Permission::ViewTasks).await?;
    let tasks = access.tenant.get_tasks(status.map(Into::into)).await?;

    let body = list_body(
        tasks
            .iter()
            .map(|t| format!("• `{}` **{}** [{}] p{}", t.id, t.title, t.status, t.priority))
            .collect(),
        TASK_LIST_LIMIT,
        "No tasks.",
    );
    reply(ctx, embed("Tasks", COLOR_INFO).description(body)).await
}

/// take a pending task
#[poise::command(slash_command, guild_only)]
pub async fn accept_task(
    ctx: Context<'_>,
    #[description = "Task id from /list_tasks"] task_id: String,
) -> Result<(), CommandError> {
    let Ok(task_id) = Uuid::parse_str(task_id.trim()) else {
        ctx.say("That is not a valid task id.").await?;
        return Ok(());
    };
    let access = authorize(ctx, Permission::AcceptTasks).await?;
    let task = access.tenant.accept_task(task_id, &access.user).await?;
    reply(ctx, task_embed("Task accepted", COLOR_SUCCESS, &task)).await
}

/// mark your task as done
#[poise::command(slash_command, guild_only)]
pub async fn complete_task(
    ctx: Context<'_>,
    #[description = "Task id from /list_tasks"] task_id: String,
) -> Result<(), CommandError> {
    let Ok(task_id) = Uuid::parse_str(task_id.trim()) else {
        ctx.say("That is not a valid task id.").await?;
        return Ok(());
    };
    let access = authorize(ctx, Permission::AcceptTasks).await?;

    let task = access
        .tenant
        .get_task(task_id)
        .await?
        .ok_or_else(|| TenantError::from(StoreError::NotFound(format!("task {}", task_id))))?;
    if task.assigned_to != Some(access.user.id) && !access.user.is_server_admin {
        return Err(
            TenantError::InvalidTransition("task is assigned to someone else".to_string()).into(),
        );
    }

    let task = access.tenant.complete_task(task_id).await?;
    reply(ctx, task_embed("Task completed", COLOR_SUCCESS, &task)).await
}

fn task_embed(title: &str, color: u32, task: &LogisticsTask) -> serenity::CreateEmbed {
    let mut card = embed(title, color)
        .field("Title", &task.title, false)
        .field("Type", &task.task_type, true)
        .field("Status", task.status.as_str(), true)
        .field("Priority", task.priority.to_string(), true)
        .footer(serenity::CreateEmbedFooter::new(task.id.to_string()));
    if let Some(description) = &task.description {
        card = card.description(description);
    }
    card
}
