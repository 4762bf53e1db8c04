// Moderation domain models - events in, decisions out.
//
// These are pure domain types with no SDK dependencies. The platform layers
// convert their wire events into these before the rules run.

/// A normalized event observed on the origin network. The rules only see
/// who did what; where it happened stays with the dispatching layer.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A plain text message.
    Message {
        sender: String,
        body: String,
        /// Rendered HTML body, when the client sent one. Used only as the
        /// fallback source for nuke-command targets.
        formatted_body: Option<String>,
        /// User IDs from the message's structured mention metadata.
        mentions: Vec<String>,
    },
    /// An image post. The body is irrelevant; only the burst counts.
    MediaPost { sender: String },
    /// A user joined a room. `sender` is the joining user.
    MemberJoin { sender: String },
}

/// Why enforcement fired. Rendered into the reason string sent along with
/// bans, kicks and redactions on both platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementReason {
    /// A banned term or banned name matched.
    Policy,
    /// The media burst limit was exceeded.
    Spam,
    /// A moderator issued the nuke command.
    Manual,
}

impl std::fmt::Display for EnforcementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            EnforcementReason::Policy => "triggered deny list",
            EnforcementReason::Spam => "image spam",
            EnforcementReason::Manual => "removed by moderator",
        };
        write!(f, "{reason}")
    }
}

/// Outcome of evaluating one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing to do.
    None,
    /// Punish `target` on both platforms; `nuke` additionally purges their
    /// recent history everywhere.
    Enforce {
        target: String,
        reason: EnforcementReason,
        nuke: bool,
    },
}

/// One unit of work for the bridged-network worker. Ownership moves into
/// the queue at enqueue time; the producer keeps nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementJob {
    /// Native Discord ID, already unwrapped from the bridged handle.
    pub user_id: String,
    pub reason: String,
}
