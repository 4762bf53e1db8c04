// The bridged-network side of enforcement.
//
// The Discord client library wants to own its execution context, so nothing
// else calls into it directly: the detection side pushes jobs onto a queue
// and this worker drains them from inside the client's own task.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::moderation::EnforcementJob;

/// How often the worker looks at the queue.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("member {0} not found")]
    MemberNotFound(String),
    #[error("bridge API error: {0}")]
    Api(String),
}

/// The one call the worker needs from the bridged network: resolve a native
/// ID to a guild member and ban them.
#[async_trait]
pub trait BridgeModeration: Send + Sync {
    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), BridgeError>;
}

/// Drains the enforcement queue against the bridged network.
///
/// Polls instead of awaiting the channel: the host client expects short,
/// re-entrant calls on its task, and one job per tick keeps it that way. A
/// job whose member can't be resolved is dropped, not retried.
pub async fn run_bridge_worker<B: BridgeModeration>(
    mut queue: UnboundedReceiver<EnforcementJob>,
    bridge: B,
) {
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    loop {
        tick.tick().await;
        match queue.try_recv() {
            Ok(job) => process_job(&job, &bridge).await,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                tracing::info!("enforcement queue closed, bridge worker stopping");
                break;
            }
        }
    }
}

async fn process_job<B: BridgeModeration>(job: &EnforcementJob, bridge: &B) {
    match bridge.ban_member(&job.user_id, &job.reason).await {
        Ok(()) => tracing::info!(user_id = %job.user_id, "banned bridged user"),
        Err(e) => tracing::warn!(user_id = %job.user_id, "dropping ban job: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MockBridge {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BridgeModeration for MockBridge {
        async fn ban_member(&self, user_id: &str, _reason: &str) -> Result<(), BridgeError> {
            self.calls.lock().unwrap().push(user_id.to_string());
            if self.fail {
                return Err(BridgeError::MemberNotFound(user_id.to_string()));
            }
            Ok(())
        }
    }

    fn job(user_id: &str) -> EnforcementJob {
        EnforcementJob {
            user_id: user_id.to_string(),
            reason: "triggered deny list".to_string(),
        }
    }

    #[tokio::test]
    async fn resolvable_member_is_banned_once() {
        let bridge = MockBridge::default();
        process_job(&job("123456"), &bridge).await;
        assert_eq!(*bridge.calls.lock().unwrap(), vec!["123456".to_string()]);
    }

    #[tokio::test]
    async fn resolution_failure_drops_the_job() {
        let bridge = MockBridge {
            fail: true,
            ..Default::default()
        };
        process_job(&job("123456"), &bridge).await;
        // One attempt, no retry.
        assert_eq!(bridge.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn worker_stops_when_the_queue_closes() {
        let (tx, rx) = mpsc::unbounded_channel::<EnforcementJob>();
        drop(tx);
        // Returns instead of spinning forever on a dead queue.
        run_bridge_worker(rx, MockBridge::default()).await;
    }
}
