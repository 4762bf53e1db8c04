// This is the entry point of the bridge moderation bot.
//
// **Architecture Overview:**
// - `core/` = Moderation decisions and the enforcement pipeline (platform-agnostic)
// - `infra/` = Matrix REST client implementing the core's moderation port
// - `matrix/` = The detection loop over the sync stream
// - `discord/` = The bridged-network client and its ban worker
//
// This file's job is to:
// 1. Load configuration
// 2. Log in and run the initial sync (fatal on failure)
// 3. Seed the moderator set from the trusted room
// 4. Wire the two execution contexts together and run the event loop

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "matrix/matrix_layer.rs"]
mod matrix;

mod config;

use std::sync::Arc;

use anyhow::Context;

use crate::config::BotConfig;
use crate::core::enforcement::EnforcementService;
use crate::core::identity::BridgeIdentity;
use crate::core::moderation::ModerationService;
use crate::infra::matrix::MatrixHttpClient;
use crate::matrix::MatrixListener;

const DEVICE_NAME: &str = "banbridge";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // Login and initial sync are fatal: no moderation without a session.
    // The initial sync's backlog is discarded; only its batch token is kept
    // so the event loop starts at "now".
    let client = Arc::new(
        MatrixHttpClient::login(
            &config.homeserver,
            &config.matrix_user,
            &config.matrix_password,
            DEVICE_NAME,
        )
        .await
        .context("matrix login failed")?,
    );
    let initial = client.sync(None, 0).await.context("initial sync failed")?;
    tracing::info!("login and initial sync successful");

    // Moderators are whoever sits in the trusted room right now. The set is
    // never refreshed; restart the bot after mod changes.
    let moderators = client
        .joined_members(&config.trusted_room)
        .await
        .context("failed to fetch trusted room members")?;
    tracing::info!(
        count = moderators.len(),
        room = %config.trusted_room,
        "seeded moderator set"
    );

    let (jobs_tx, jobs_rx) = tokio::sync::mpsc::unbounded_channel();

    // The discord client owns its own task; only the job queue crosses over.
    let discord_token = config.discord_token.clone();
    tokio::spawn(async move {
        if let Err(e) = discord::run_bridge_client(discord_token, jobs_rx).await {
            tracing::error!("discord client stopped: {e}");
        }
    });

    let moderation = ModerationService::new(
        moderators.into_iter().collect(),
        config.ban_terms.clone(),
        config.ban_names.clone(),
    );
    let identity = BridgeIdentity::new(&config.bridge_prefix, &config.bridge_suffix);
    let enforcer = EnforcementService::new(Arc::clone(&client), identity, jobs_tx);

    let listener = MatrixListener::new(client, moderation, enforcer, config.accept_invites);
    listener.run(initial.next_batch).await;

    Ok(())
}
