// The detection loop: long-polls the sync stream and dispatches each event
// through the rule evaluator into the enforcer.
//
// Handlers run to completion in arrival order on this one task, so the rule
// evaluator and its counter never see concurrent calls.

use std::sync::Arc;
use std::time::Duration;

use crate::core::enforcement::EnforcementService;
use crate::core::moderation::{Decision, ModerationService, RoomEvent};
use crate::infra::matrix::{MatrixHttpClient, SyncResponse, TimelineEvent};

/// Long-poll timeout handed to the sync endpoint.
const SYNC_TIMEOUT_MS: u64 = 30_000;
/// Back-off after a failed sync before trying again.
const SYNC_RETRY: Duration = Duration::from_secs(5);

pub struct MatrixListener {
    client: Arc<MatrixHttpClient>,
    moderation: ModerationService,
    enforcer: EnforcementService<MatrixHttpClient>,
    accept_invites: bool,
}

impl MatrixListener {
    pub fn new(
        client: Arc<MatrixHttpClient>,
        moderation: ModerationService,
        enforcer: EnforcementService<MatrixHttpClient>,
        accept_invites: bool,
    ) -> Self {
        Self {
            client,
            moderation,
            enforcer,
            accept_invites,
        }
    }

    /// Runs the detection loop forever, starting after the initial sync's
    /// batch token so the login backlog is never moderated.
    pub async fn run(&self, mut since: String) {
        loop {
            let resp = match self.client.sync(Some(&since), SYNC_TIMEOUT_MS).await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("sync failed: {e}");
                    tokio::time::sleep(SYNC_RETRY).await;
                    continue;
                }
            };
            since = resp.next_batch.clone();
            self.handle_sync(resp).await;
        }
    }

    async fn handle_sync(&self, resp: SyncResponse) {
        if self.accept_invites {
            for room_id in resp.rooms.invite.keys() {
                tracing::info!(%room_id, "accepting room invite");
                if let Err(e) = self.client.join_room(room_id).await {
                    tracing::warn!(%room_id, "failed to join room: {e}");
                }
            }
        }

        for (room_id, room) in &resp.rooms.join {
            for event in &room.timeline.events {
                self.handle_event(room_id, event).await;
            }
        }
    }

    async fn handle_event(&self, room_id: &str, event: &TimelineEvent) {
        // Never moderate our own events; redactions would loop otherwise.
        if event.sender == self.client.user_id() {
            return;
        }

        let Some(room_event) = normalize(event) else {
            return;
        };

        if let Decision::Enforce {
            target,
            reason,
            nuke,
        } = self.moderation.evaluate(&room_event)
        {
            self.enforcer
                .enforce(&target, reason, nuke, room_id, &event.event_id)
                .await;
        }
    }
}

/// Maps a raw timeline event onto the core's event model. Event types the
/// rule table doesn't cover map to `None`.
fn normalize(event: &TimelineEvent) -> Option<RoomEvent> {
    match event.kind.as_str() {
        "m.room.message" => {
            if event.content.msgtype.as_deref() == Some("m.image") {
                return Some(RoomEvent::MediaPost {
                    sender: event.sender.clone(),
                });
            }
            let body = event.content.body.clone()?;
            Some(RoomEvent::Message {
                sender: event.sender.clone(),
                body,
                formatted_body: event.content.formatted_body.clone(),
                mentions: event
                    .content
                    .mentions
                    .as_ref()
                    .map(|m| m.user_ids.clone())
                    .unwrap_or_default(),
            })
        }
        "m.room.member" => {
            if event.content.membership.as_deref() != Some("join") {
                return None;
            }
            // The state key names the member the event is about; fall back
            // to the sender for self-joins that omit it.
            let joined = event
                .state_key
                .clone()
                .unwrap_or_else(|| event.sender.clone());
            Some(RoomEvent::MemberJoin { sender: joined })
        }
        _ => None,
    }
}
