//! Discord bot runtime using serenity and poise

use super::commands::{self, CommandError, Data};
use super::reconnect::{ReconnectController, ReconnectPolicy};
use crate::config::DiscordConfig;
use crate::error::{ConfigError, ConnectError, Result};
use crate::rbac::AuditLogger;
use crate::tenant::TenantManager;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Discord bot with bounded reconnects
pub struct DiscordBot {
    config: DiscordConfig,
    policy: ReconnectPolicy,
    tenants: TenantManager,
    audit: AuditLogger,
    connected: Arc<AtomicBool>,
    shard_manager: Arc<RwLock<Option<Arc<serenity::ShardManager>>>>,
}

impl DiscordBot {
    /// Fails fast when no token is configured
    pub fn new(
        config: DiscordConfig,
        policy: ReconnectPolicy,
        tenants: TenantManager,
        audit: AuditLogger,
    ) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(ConfigError::Missing("DISCORD_BOT_TOKEN".to_string()).into());
        }

        Ok(Self {
            config,
            policy,
            tenants,
            audit,
            connected: Arc::new(AtomicBool::new(false)),
            shard_manager: Arc::new(RwLock::new(None)),
        })
    }

    /// Whether the gateway session is currently up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Run the bot until it stops cleanly or the reconnect budget is spent.
    pub async fn run(&self) -> std::result::Result<(), ConnectError> {
        let controller = ReconnectController::new(self.policy.clone());
        info!(
            "starting discord bot (max retries: {}, retry delay: {}s)",
            self.policy.max_retries,
            self.policy.retry_delay.as_secs()
        );
        controller.run(|_| self.connect_once()).await
    }

    /// Disconnect if connected. Safe to call at any time, including twice.
    pub async fn shutdown(&self) {
        let manager = self.shard_manager.write().await.take();
        match manager {
            Some(manager) => {
                manager.shutdown_all().await;
                info!("Bot disconnected gracefully.");
            }
            None => debug!("shutdown requested but the bot is not connected"),
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// One full connection: build the client, then block in `start` until the
    /// session ends.
    async fn connect_once(&self) -> std::result::Result<(), ConnectError> {
        let intents = serenity::GatewayIntents::non_privileged();
        let data = Data {
            tenants: self.tenants.clone(),
            audit: self.audit.clone(),
        };
        let guild_id = self.config.guild_id;

        let framework = poise::Framework::builder()
            .options(poise::FrameworkOptions {
                commands: commands::all(),
                on_error: |error| Box::pin(commands::on_error(error)),
                ..Default::default()
            })
            .setup(move |ctx, ready, framework| {
                Box::pin(async move {
                    info!("discord bot connected as {}", ready.user.name);
                    register_commands(ctx, &framework.options().commands, guild_id).await;
                    Ok(data)
                })
            })
            .build();

        let handler = EventHandler {
            connected: Arc::clone(&self.connected),
            tenants: self.tenants.clone(),
        };

        let mut client = serenity::ClientBuilder::new(&self.config.token, intents)
            .framework(framework)
            .event_handler(handler)
            .await
            .map_err(classify_client_error)?;

        *self.shard_manager.write().await = Some(Arc::clone(&client.shard_manager));

        let result = client.start().await.map_err(classify_client_error);

        self.connected.store(false, Ordering::SeqCst);
        self.shard_manager.write().await.take();
        result
    }
}

async fn register_commands(
    ctx: &serenity::Context,
    commands: &[poise::Command<Data, CommandError>],
    guild_id: Option<u64>,
) {
    match guild_id {
        // guild registration is instant, global can take up to an hour
        Some(id) => {
            let gid = serenity::GuildId::new(id);
            match poise::builtins::register_in_guild(ctx, commands, gid).await {
                Ok(()) => info!("registered slash commands in guild {}", id),
                Err(e) => error!("failed to register commands in guild {}: {}", id, e),
            }
        }
        None => match poise::builtins::register_globally(ctx, commands).await {
            Ok(()) => info!("registered global slash commands"),
            Err(e) => error!("failed to register global commands: {}", e),
        },
    }
}

/// Map a serenity failure onto the reconnect loop's error kinds
fn classify_client_error(err: serenity::Error) -> ConnectError {
    if matches!(
        err,
        serenity::Error::Gateway(serenity::GatewayError::InvalidAuthentication)
    ) {
        return ConnectError::Authentication(err.to_string());
    }
    classify_error_message(&err.to_string())
}

/// Rejected credentials (HTTP 401) are terminal, anything else is transient.
pub fn classify_error_message(message: &str) -> ConnectError {
    if message.contains("401") || message.contains("Unauthorized") {
        ConnectError::Authentication(message.to_string())
    } else {
        ConnectError::Connection(message.to_string())
    }
}

struct EventHandler {
    connected: Arc<AtomicBool>,
    tenants: TenantManager,
}

#[serenity::async_trait]
impl serenity::EventHandler for EventHandler {
    async fn ready(&self, _ctx: serenity::Context, ready: serenity::Ready) {
        self.connected.store(true, Ordering::SeqCst);
        info!(
            "{} is ready in {} guild(s)",
            ready.user.name,
            ready.guilds.len()
        );

        for guild in &ready.guilds {
            match self
                .tenants
                .get_tenant_by_discord_guild(&guild.id.to_string())
                .await
            {
                Ok(Some(tenant)) => info!("guild {} -> regiment {}", guild.id, tenant.slug()),
                Ok(None) => warn!("guild {} has no regiment registered", guild.id),
                Err(e) => error!("tenant lookup for guild {} failed: {}", guild.id, e),
            }
        }
    }

    async fn resume(&self, _ctx: serenity::Context, _event: serenity::ResumedEvent) {
        self.connected.store(true, Ordering::SeqCst);
        info!("discord session resumed");
    }

    async fn shard_stage_update(
        &self,
        _ctx: serenity::Context,
        event: serenity::ShardStageUpdateEvent,
    ) {
        if event.new == serenity::ConnectionStage::Disconnected {
            self.connected.store(false, Ordering::SeqCst);
            warn!("shard {:?} disconnected", event.shard_id);
        }
    }

    async fn guild_create(
        &self,
        ctx: serenity::Context,
        guild: serenity::Guild,
        is_new: Option<bool>,
    ) {
        if is_new != Some(true) {
            return;
        }
        info!("joined guild {} ({})", guild.name, guild.id);

        match self
            .tenants
            .get_tenant_by_discord_guild(&guild.id.to_string())
            .await
        {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(e) => {
                error!("tenant lookup for new guild {} failed: {}", guild.id, e);
                return;
            }
        }

        let Some(channel) = guild.system_channel_id else {
            debug!("guild {} has no system channel for the welcome message", guild.id);
            return;
        };
        let message = serenity::CreateMessage::new().embed(commands::welcome_embed());
        if let Err(e) = channel.send_message(&ctx.http, message).await {
            warn!("failed to send welcome message to {}: {}", guild.id, e);
        }
    }
}
