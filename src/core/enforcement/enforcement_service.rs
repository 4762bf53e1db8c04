// Cross-platform enforcement pipeline.
//
// Given a decision from the rule evaluator, this service punishes the target
// on whichever platform they actually live on: native Matrix users are
// banned room by room, bridged Discord users are queued for the bridge
// worker and kicked off the Matrix side so they drop out of member lists.
// Everything downstream of the decision is best-effort and single-attempt.

use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::identity::{BridgeIdentity, SenderIdentity};
use crate::core::moderation::{EnforcementJob, EnforcementReason};

/// Only the most recent slice of a room is scanned during a purge; older
/// offending messages stay up.
const PURGE_SCAN_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Matrix API error: {0}")]
    Api(String),
}

/// A message pulled back from room history, most recent first.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub event_id: String,
    pub sender: String,
    /// Raw event type, e.g. "m.room.message".
    pub kind: String,
}

/// The moderation calls the core needs from the origin network.
///
/// Implemented by the reqwest client in infra; mocked in tests.
#[async_trait]
pub trait MatrixModeration: Send + Sync {
    /// Rooms the bot is currently joined to. Queried fresh before every
    /// sweep so join/leave churn is reflected.
    async fn joined_rooms(&self) -> Result<Vec<String>, MatrixError>;
    async fn ban_user(&self, room_id: &str, user_id: &str, reason: &str) -> Result<(), MatrixError>;
    async fn kick_user(&self, room_id: &str, user_id: &str, reason: &str)
        -> Result<(), MatrixError>;
    async fn redact_event(
        &self,
        room_id: &str,
        event_id: &str,
        txn_id: &str,
        reason: &str,
    ) -> Result<(), MatrixError>;
    /// Up to `limit` most recent messages in reverse-chronological order.
    async fn recent_messages(&self, room_id: &str, limit: u32)
        -> Result<Vec<RoomMessage>, MatrixError>;
}

enum Sweep {
    Ban,
    Kick,
}

/// Executes enforcement decisions across both platforms.
pub struct EnforcementService<M: MatrixModeration> {
    matrix: Arc<M>,
    identity: BridgeIdentity,
    bridge_queue: UnboundedSender<EnforcementJob>,
}

impl<M: MatrixModeration> EnforcementService<M> {
    pub fn new(
        matrix: Arc<M>,
        identity: BridgeIdentity,
        bridge_queue: UnboundedSender<EnforcementJob>,
    ) -> Self {
        Self {
            matrix,
            identity,
            bridge_queue,
        }
    }

    /// Runs the full pipeline for one decision. A failure in one room or
    /// one action class never stops the rest; nothing is retried.
    pub async fn enforce(
        &self,
        target: &str,
        reason: EnforcementReason,
        nuke: bool,
        room_id: &str,
        event_id: &str,
    ) {
        match self.identity.classify(target) {
            SenderIdentity::Bridged { user_id, native_id } => {
                tracing::info!(user = %user_id, %native_id, %reason, "enforcing against bridged user");
                // The discord side bans; the kick just clears the ghost out
                // of Matrix member lists.
                let job = EnforcementJob {
                    user_id: native_id,
                    reason: reason.to_string(),
                };
                if self.bridge_queue.send(job).is_err() {
                    tracing::error!("bridge worker is gone, dropping bridged ban");
                }
                self.sweep_rooms(Sweep::Kick, &user_id, reason).await;
            }
            SenderIdentity::Origin { user_id } => {
                tracing::info!(user = %user_id, %reason, "enforcing against matrix user");
                self.sweep_rooms(Sweep::Ban, &user_id, reason).await;
            }
        }

        // Ban and kick leave already-posted content in place, so the
        // triggering event is always redacted. The bridge propagates the
        // redaction to the Discord side.
        if let Err(e) = self
            .matrix
            .redact_event(room_id, event_id, &new_txn_id(), &reason.to_string())
            .await
        {
            tracing::warn!(%room_id, %event_id, "failed to redact triggering event: {e}");
        }

        if nuke {
            self.purge_history(target, room_id).await;
        }
    }

    /// Applies one action to every joined room. Rooms where the bot lacks
    /// power fail individually and are skipped.
    async fn sweep_rooms(&self, action: Sweep, user_id: &str, reason: EnforcementReason) {
        let rooms = match self.matrix.joined_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!("failed to list joined rooms: {e}");
                return;
            }
        };

        let reason = reason.to_string();
        for room in &rooms {
            let outcome = match action {
                Sweep::Ban => self.matrix.ban_user(room, user_id, &reason).await,
                Sweep::Kick => self.matrix.kick_user(room, user_id, &reason).await,
            };
            if let Err(e) = outcome {
                let verb = match action {
                    Sweep::Ban => "ban",
                    Sweep::Kick => "kick",
                };
                tracing::warn!(%room, "failed to {verb} {user_id}: {e}");
            }
        }
    }

    /// Redacts the target's recent messages in the seed room, then in every
    /// currently joined room. The joined set is re-read fresh, and the seed
    /// room comes around again; re-redacting is a server-side no-op.
    pub async fn purge_history(&self, target: &str, seed_room: &str) {
        self.purge_room(target, seed_room).await;

        let rooms = match self.matrix.joined_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!("failed to list joined rooms for purge: {e}");
                return;
            }
        };
        for room in &rooms {
            self.purge_room(target, room).await;
        }
    }

    async fn purge_room(&self, target: &str, room_id: &str) {
        let messages = match self.matrix.recent_messages(room_id, PURGE_SCAN_LIMIT).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(%room_id, "failed to fetch history for purge: {e}");
                return;
            }
        };

        let offending = messages
            .iter()
            .take(PURGE_SCAN_LIMIT as usize)
            .filter(|m| m.sender == target && m.kind == "m.room.message");
        for message in offending {
            if let Err(e) = self
                .matrix
                .redact_event(room_id, &message.event_id, &new_txn_id(), "purged")
                .await
            {
                tracing::warn!(%room_id, event_id = %message.event_id, "failed to redact during purge: {e}");
            }
        }
    }
}

/// The redaction endpoint wants a client-unique transaction ID per call.
fn new_txn_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
