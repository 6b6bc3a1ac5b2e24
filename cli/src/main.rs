//! Quartermaster CLI - Command-line interface for the Foxhole logistics bot

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use console::Style;
use quartermaster_core::{
    AuditLogger, Config, DiscordBot, Faction, NewTenant, NewUser, ReconnectPolicy, Role,
    SqliteStore, Tenant, TenantManager, TenantStore, load_config, process_audit_logs, save_config,
};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

const QM_LOGO: &str = r#"
   ___  __  __
  / _ \|  \/  |
 | | | | |\/| |
 | |_| | |  | |
  \__\_\_|  |_|
"#;

/// Quartermaster - Foxhole logistics for Discord regiments
#[derive(Parser, Debug)]
#[command(name = "quartermaster")]
#[command(version)]
#[command(about = "Quartermaster - Foxhole logistics for Discord regiments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Start the Discord bot
    Run {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show quartermaster status
    Status,

    /// Manage regiments
    Tenants {
        #[command(subcommand)]
        tenant_cmd: TenantCommands,
    },

    /// Manage regiment members
    Members {
        #[command(subcommand)]
        member_cmd: MemberCommands,
    },

    /// Manage global server admins
    Admin {
        #[command(subcommand)]
        admin_cmd: AdminCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// List all regiments
    List,

    /// Register a regiment
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Slug (lowercase letters, digits, hyphens)
        #[arg(short, long)]
        slug: String,
        /// Discord guild ID
        #[arg(short, long)]
        guild: String,
        /// Discord ID of the first regiment admin
        #[arg(short, long)]
        owner: String,
        /// colonial or warden
        #[arg(short, long)]
        faction: Option<String>,
    },

    /// Show one regiment by slug or guild ID
    Show {
        /// Slug or Discord guild ID
        tenant: String,
    },
}

#[derive(Subcommand, Debug)]
enum MemberCommands {
    /// List members of a regiment
    List {
        /// Slug or Discord guild ID
        tenant: String,
    },

    /// Add a member
    Add {
        /// Slug or Discord guild ID
        tenant: String,
        /// Discord user ID
        discord_id: String,
        /// end_user, logistics_manager or regiment_admin
        #[arg(short, long, default_value = "end_user")]
        role: String,
        /// Username recorded for a user seen for the first time
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Remove a member
    Remove {
        /// Slug or Discord guild ID
        tenant: String,
        /// Discord user ID
        discord_id: String,
    },

    /// Change a member's role
    SetRole {
        /// Slug or Discord guild ID
        tenant: String,
        /// Discord user ID
        discord_id: String,
        /// end_user, logistics_manager or regiment_admin
        role: String,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommands {
    /// Grant server admin
    Grant {
        /// Discord user ID
        discord_id: String,
    },

    /// Revoke server admin
    Revoke {
        /// Discord user ID
        discord_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            command_init().await?;
        }
        Commands::Run { verbose } => {
            command_run(verbose).await?;
        }
        Commands::Status => {
            command_status().await?;
        }
        Commands::Tenants { tenant_cmd } => {
            command_tenants(tenant_cmd).await?;
        }
        Commands::Members { member_cmd } => {
            command_members(member_cmd).await?;
        }
        Commands::Admin { admin_cmd } => {
            command_admin(admin_cmd).await?;
        }
    }

    Ok(())
}

/// Initialize quartermaster configuration
async fn command_init() -> Result<()> {
    let green = Style::new().green();

    println!("{}{} QUARTERMASTER SETUP", QM_LOGO, green.apply_to(">>>"));

    let config_path = quartermaster_core::get_config_path();
    if config_path.exists() {
        println!("\n⚠️  Config already exists at {}", config_path.display());
        println!("Leaving it untouched. Delete it first to regenerate.");
        return Ok(());
    }

    save_config(&Config::default()).await?;
    println!("\n✅ Created config at {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Put DISCORD_BOT_TOKEN in .env or the config file");
    println!("     Get one at: https://discord.com/developers/applications");
    println!("  2. Optionally set DEFAULT_ADMIN_DISCORD_ID to your Discord user ID");
    println!("  3. Start the bot: quartermaster run");

    Ok(())
}

/// Start the bot
async fn command_run(verbose: bool) -> Result<()> {
    // Setup logging
    let filter = if verbose {
        EnvFilter::builder().parse("debug")?
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("{} Starting quartermaster...", QM_LOGO);

    let config = load_config().await?;
    config.require_token()?;

    let manager = open_manager(&config).await?;

    if let Some(admin_id) = &config.default_admin_discord_id {
        manager.ensure_server_admin(admin_id).await?;
        info!("default admin {} ensured", admin_id);
    }

    let (audit, audit_rx) = AuditLogger::new();
    tokio::spawn(process_audit_logs(audit_rx));

    let bot = DiscordBot::new(
        config.discord.clone(),
        ReconnectPolicy::from_config(&config.reconnect),
        manager,
        audit,
    )?;

    let outcome = tokio::select! {
        result = bot.run() => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    };

    bot.shutdown().await;
    outcome.context("discord bot stopped")
}

/// Show status
async fn command_status() -> Result<()> {
    let green = Style::new().green();

    println!("{}\nquartermaster Status\n", QM_LOGO);

    let config_path = quartermaster_core::get_config_path();
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() {
            green.apply_to("✅")
        } else {
            console::style("❌").red()
        }
    );

    let config = load_config().await?;
    println!(
        "Discord token: {}",
        if config.require_token().is_ok() {
            green.apply_to("✅")
        } else {
            console::style("not set").dim()
        }
    );
    println!(
        "Reconnect: {} retries, {}s delay",
        config.reconnect.max_retries, config.reconnect.retry_delay_secs
    );
    println!("Database: {}", config.database.url);

    match open_manager(&config).await {
        Ok(manager) => {
            let store = manager.store();
            match store.health_check().await {
                Ok(()) => println!("Store ({}): {}", store.backend_name(), green.apply_to("✅")),
                Err(e) => println!("Store ({}): {}", store.backend_name(), console::style(e).red()),
            }
            let tenants = manager.list_tenants().await?;
            println!("Regiments: {}", tenants.len());
        }
        Err(e) => println!("Store: {}", console::style(e).red()),
    }

    Ok(())
}

/// Regiment commands
async fn command_tenants(cmd: TenantCommands) -> Result<()> {
    let config = load_config().await?;
    let manager = open_manager(&config).await?;

    match cmd {
        TenantCommands::List => {
            let tenants = manager.list_tenants().await?;
            if tenants.is_empty() {
                println!("No regiments registered.");
            } else {
                println!("Regiments:\n");
                for tenant in tenants {
                    println!(
                        "  {} ({}) guild {}",
                        tenant.name(),
                        tenant.slug(),
                        tenant.guild_id()
                    );
                }
            }
        }
        TenantCommands::Create {
            name,
            slug,
            guild,
            owner,
            faction,
        } => {
            let mut new_tenant = NewTenant::new(name, slug, guild);
            if let Some(faction) = faction {
                let faction = Faction::from_str(&faction)
                    .ok_or_else(|| anyhow!("unknown faction '{}'", faction))?;
                new_tenant = new_tenant.with_faction(faction);
            }
            let creator = manager
                .get_or_create_user(NewUser::new(owner.clone(), owner))
                .await?;
            let tenant = manager.create_tenant(new_tenant, &creator).await?;
            println!("✓ Created regiment '{}' ({})", tenant.name(), tenant.slug());
        }
        TenantCommands::Show { tenant } => {
            let tenant = find_tenant(&manager, &tenant).await?;
            let record = tenant.record();
            println!("{}\n", record.name);
            println!("  Slug:     {}", record.slug);
            println!("  Guild:    {}", record.discord_guild_id);
            if let Some(faction) = record.faction {
                println!("  Faction:  {}", faction.as_str());
            }
            if let Some(description) = &record.description {
                println!("  About:    {}", description);
            }
            println!("  Created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Members:  {}", tenant.list_members().await?.len());
            println!("  Config:   {}", serde_json::to_string(tenant.config())?);
        }
    }

    Ok(())
}

/// Membership commands
async fn command_members(cmd: MemberCommands) -> Result<()> {
    let config = load_config().await?;
    let manager = open_manager(&config).await?;

    match cmd {
        MemberCommands::List { tenant } => {
            let tenant = find_tenant(&manager, &tenant).await?;
            let members = tenant.list_members().await?;
            if members.is_empty() {
                println!("No members in {}.", tenant.slug());
            } else {
                println!("Members of {}:\n", tenant.slug());
                for member in members {
                    println!(
                        "  {} [{}] {} since {}",
                        member.label(),
                        member.discord_id,
                        member.role.display_name(),
                        member.joined_at.format("%Y-%m-%d")
                    );
                }
            }
        }
        MemberCommands::Add {
            tenant,
            discord_id,
            role,
            username,
        } => {
            let tenant = find_tenant(&manager, &tenant).await?;
            let role = parse_role(&role)?;
            let username = username.unwrap_or_else(|| discord_id.clone());
            let user = manager
                .get_or_create_user(NewUser::new(discord_id, username))
                .await?;
            if tenant.add_member(&user, role).await? {
                println!("✓ Added {} to {} as {}", user.label(), tenant.slug(), role);
            } else {
                println!("{} is already a member of {}", user.label(), tenant.slug());
            }
        }
        MemberCommands::Remove { tenant, discord_id } => {
            let tenant = find_tenant(&manager, &tenant).await?;
            let user = manager
                .find_user(&discord_id)
                .await?
                .ok_or_else(|| anyhow!("unknown user {}", discord_id))?;
            if tenant.remove_member(&user).await? {
                println!("✓ Removed {} from {}", user.label(), tenant.slug());
            } else {
                println!("{} is not a member of {}", user.label(), tenant.slug());
            }
        }
        MemberCommands::SetRole {
            tenant,
            discord_id,
            role,
        } => {
            let tenant = find_tenant(&manager, &tenant).await?;
            let role = parse_role(&role)?;
            let user = manager
                .find_user(&discord_id)
                .await?
                .ok_or_else(|| anyhow!("unknown user {}", discord_id))?;
            if tenant.update_member_role(&user, role).await? {
                println!("✓ {} is now {} in {}", user.label(), role, tenant.slug());
            } else {
                println!("{} is not a member of {}", user.label(), tenant.slug());
            }
        }
    }

    Ok(())
}

/// Server admin commands
async fn command_admin(cmd: AdminCommands) -> Result<()> {
    let config = load_config().await?;
    let manager = open_manager(&config).await?;

    match cmd {
        AdminCommands::Grant { discord_id } => {
            let user = manager.ensure_server_admin(&discord_id).await?;
            println!("✓ {} is a server admin", user.label());
        }
        AdminCommands::Revoke { discord_id } => {
            match manager.revoke_server_admin(&discord_id).await? {
                Some(true) => println!("✓ Revoked server admin from {}", discord_id),
                Some(false) => println!("{} was not a server admin", discord_id),
                None => {
                    warn!("revoke requested for unknown user {}", discord_id);
                    println!("No user with Discord id {}", discord_id);
                }
            }
        }
    }

    Ok(())
}

async fn open_manager(config: &Config) -> Result<TenantManager> {
    tokio::fs::create_dir_all(quartermaster_core::get_data_dir())
        .await
        .context("failed to create data directory")?;
    let store = SqliteStore::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    let store: Arc<dyn TenantStore> = Arc::new(store);
    Ok(TenantManager::new(store))
}

async fn find_tenant(manager: &TenantManager, slug_or_guild: &str) -> Result<Tenant> {
    manager
        .resolve_tenant(slug_or_guild)
        .await?
        .ok_or_else(|| anyhow!("no regiment matches '{}'", slug_or_guild))
}

fn parse_role(raw: &str) -> Result<Role> {
    let role = Role::from_str(raw).ok_or_else(|| anyhow!("unknown role '{}'", raw))?;
    if !role.is_assignable() {
        return Err(anyhow!("{} cannot be a membership role", role.display_name()));
    }
    Ok(role)
}
