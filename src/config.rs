// Startup configuration. Read once from the environment (plus .env), then
// handed into the components that need it.

use anyhow::{Context, Result};

/// Everything the bot needs to come up. Lists are comma-separated in the
/// environment, matching the deployed config format (no trimming: a term
/// with a leading space matches with that space).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub homeserver: String,
    pub matrix_user: String,
    pub matrix_password: String,
    pub discord_token: String,
    /// Substrings that get a message's author banned.
    pub ban_terms: Vec<String>,
    /// Substrings that get a joining user banned on sight.
    pub ban_names: Vec<String>,
    /// Room whose membership seeds the moderator set at startup.
    pub trusted_room: String,
    pub accept_invites: bool,
    pub bridge_prefix: String,
    pub bridge_suffix: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            homeserver: required("MATRIX_HOMESERVER")?,
            matrix_user: required("MATRIX_USER")?,
            matrix_password: required("MATRIX_PASSWORD")?,
            discord_token: required("DISCORD_TOKEN")?,
            ban_terms: list("BAN_TERMS"),
            ban_names: list("BAN_NAMES"),
            trusted_room: required("TRUSTED_ROOM_ID")?,
            accept_invites: flag("ACCEPT_INVITES"),
            bridge_prefix: std::env::var("BRIDGE_PREFIX")
                .unwrap_or_else(|_| "@_discord_".to_string()),
            bridge_suffix: std::env::var("BRIDGE_SUFFIX")
                .unwrap_or_else(|_| ":t2bot.io".to_string()),
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing {name} environment variable"))
}

fn list(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

fn flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false)
}
