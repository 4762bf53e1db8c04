// Discord side of enforcement.
//
// The serenity client owns its own task; the only thing crossing in is the
// job queue receiver, handed to the poll loop once the gateway is ready.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Client, Context, EventHandler, GatewayIntents, GuildId, Http, Ready, UserId};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

use crate::core::enforcement::{run_bridge_worker, BridgeError, BridgeModeration};
use crate::core::moderation::EnforcementJob;

struct BanWorker {
    queue: Mutex<Option<UnboundedReceiver<EnforcementJob>>>,
}

#[async_trait]
impl EventHandler for BanWorker {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("logged in to discord as {}", ready.user.name);

        // The bot lives in exactly one guild; moderate the first one.
        let Some(guild_id) = ready.guilds.first().map(|guild| guild.id) else {
            tracing::error!("discord bot is in no guild, bridged bans disabled");
            return;
        };

        // Ready fires again on reconnect; the queue only exists the first
        // time, and the worker it was handed to is still running.
        let Some(queue) = self.queue.lock().await.take() else {
            return;
        };

        let gateway = GuildGateway {
            http: ctx.http.clone(),
            guild_id,
        };
        tokio::spawn(run_bridge_worker(queue, gateway));
    }
}

struct GuildGateway {
    http: Arc<Http>,
    guild_id: GuildId,
}

#[async_trait]
impl BridgeModeration for GuildGateway {
    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), BridgeError> {
        // UserId::new rejects 0, so a malformed handle fails here instead.
        let user_id: u64 = user_id
            .parse()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| BridgeError::MemberNotFound(user_id.to_string()))?;

        let member = self
            .http
            .get_member(self.guild_id, UserId::new(user_id))
            .await
            .map_err(|e| BridgeError::MemberNotFound(format!("{user_id}: {e}")))?;

        member
            .ban_with_reason(&self.http, 0, reason)
            .await
            .map_err(|e| BridgeError::Api(e.to_string()))?;
        Ok(())
    }
}

/// Starts the serenity client and blocks until it exits.
pub async fn run_bridge_client(
    token: String,
    queue: UnboundedReceiver<EnforcementJob>,
) -> anyhow::Result<()> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS | GatewayIntents::GUILD_MODERATION;

    let handler = BanWorker {
        queue: Mutex::new(Some(queue)),
    };

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;
    client.start().await?;
    Ok(())
}
