use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

/// Discord bot linking Discord accounts to the RDS backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Register slash commands in this guild only (faster for testing)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Number of verification requests processed concurrently (overrides VERIFY_WORKERS)
    #[arg(long, short = 'w')]
    workers: Option<usize>,
}

mod commands;
mod config;
mod error;
mod logging;
mod messages;
mod queue;
mod verification;

use commands::verify;
use config::BridgeConfig;
use queue::{create_queue, run_consumer, VerificationQueue};
use verification::{create_shared_orchestrator, ServiceSigner};

const QUEUE_CAPACITY: usize = 256;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub queue: VerificationQueue,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = BridgeConfig::from_env()?;
    if let Some(workers) = args.workers {
        config = config.with_workers("--workers", workers)?;
    }

    logging::init(&config.log_level);

    // Fail fast on a bad signing key instead of on the first /verify
    let signer = ServiceSigner::from_pem(&config.bot_private_key, &config.service_name)?;
    info!("Service signing key loaded for issuer '{}'", signer.issuer());

    let config = Arc::new(config);
    let orchestrator = create_shared_orchestrator(config.clone())?;

    let (queue, receiver) = create_queue(QUEUE_CAPACITY);
    let consumer = tokio::spawn(run_consumer(receiver, orchestrator, config.workers));

    let target_guild_id = args.guild_id;
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Registering commands to guild {} only", gid);
    } else {
        info!("Registering commands globally (takes up to 1 hour to propagate)");
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![verify()],
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let queue = queue.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                if let Some(gid) = target_guild_id {
                    let guild_id = serenity::GuildId::new(gid);
                    if let Err(e) = poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        guild_id,
                    ).await {
                        error!("Failed to register commands for guild {}: {}", guild_id, e);
                    } else {
                        info!("Successfully registered {} commands for guild {}",
                              framework.options().commands.len(), guild_id);
                    }
                } else if let Err(e) = poise::builtins::register_globally(
                    ctx,
                    &framework.options().commands,
                ).await {
                    error!("Failed to register commands globally: {}", e);
                } else {
                    info!("Successfully registered {} commands globally",
                          framework.options().commands.len());
                }

                Ok(Data { queue })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    let mut client = serenity::ClientBuilder::new(&config.bot_token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    let result = client.start().await;
    warn!("Bot ended.");

    // Dropping the client drops the last queue sender, letting in-flight work drain
    drop(client);
    if let Err(e) = consumer.await {
        error!("Verification consumer panicked: {}", e);
    }

    result?;
    Ok(())
}
