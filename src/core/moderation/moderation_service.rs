// Rule evaluation - core decision logic for moderation.
//
// This service turns one observed event into at most one enforcement
// decision. It holds the moderator set, the deny lists and the spam counter,
// and is only ever called from the single detection task.
//
// NO Matrix or Discord dependencies here - just pure domain logic.

use std::collections::HashSet;

use regex::Regex;

use super::moderation_models::{Decision, EnforcementReason, RoomEvent};
use super::spam_counter::SpamCounter;

/// The one in-chat command the bot understands.
const NUKE_COMMAND: &str = "!nuke";
/// Media posts allowed inside one counter window; the post after this trips.
const MEDIA_BURST_LIMIT: u32 = 7;

/// Evaluates events against the deny lists and the burst counter.
pub struct ModerationService {
    moderators: HashSet<String>,
    ban_terms: Vec<String>,
    ban_names: Vec<String>,
    spam: SpamCounter,
    profile_link: Regex,
}

impl ModerationService {
    pub fn new(moderators: HashSet<String>, ban_terms: Vec<String>, ban_names: Vec<String>) -> Self {
        Self {
            moderators,
            ban_terms,
            ban_names,
            spam: SpamCounter::new(),
            // Profile links in rendered reply bodies look like
            // https://matrix.to/#/@user:server - capture the path segment.
            profile_link: Regex::new(r#"matrix\.to/#/(@[^"'\s?]+)"#).expect("static regex"),
        }
    }

    fn is_moderator(&self, user_id: &str) -> bool {
        self.moderators.contains(user_id)
    }

    /// Decides what, if anything, to do about one event.
    ///
    /// All text checks are case-sensitive substring containment, not word
    /// matches: the term "ban" fires inside "banana". That matches the
    /// deployed deny-list semantics and stays as-is.
    pub fn evaluate(&self, event: &RoomEvent) -> Decision {
        match event {
            RoomEvent::Message {
                sender,
                body,
                formatted_body,
                mentions,
                ..
            } => {
                if body.starts_with(NUKE_COMMAND) {
                    return self.evaluate_nuke(sender, mentions, formatted_body.as_deref());
                }
                if self.is_moderator(sender) {
                    return Decision::None;
                }
                for term in &self.ban_terms {
                    if body.contains(term.as_str()) {
                        tracing::info!(%sender, %term, "found banned term in message");
                        return Decision::Enforce {
                            target: sender.clone(),
                            reason: EnforcementReason::Policy,
                            nuke: false,
                        };
                    }
                }
                Decision::None
            }
            RoomEvent::MemberJoin { sender, .. } => {
                for name in &self.ban_names {
                    if sender.contains(name.as_str()) {
                        tracing::info!(%sender, %name, "banned name matched on join");
                        return Decision::Enforce {
                            target: sender.clone(),
                            reason: EnforcementReason::Policy,
                            nuke: false,
                        };
                    }
                }
                Decision::None
            }
            RoomEvent::MediaPost { sender, .. } => {
                if self.is_moderator(sender) {
                    return Decision::None;
                }
                let count = self.spam.increment(sender);
                if count > MEDIA_BURST_LIMIT {
                    tracing::info!(%sender, count, "media burst limit exceeded");
                    Decision::Enforce {
                        target: sender.clone(),
                        reason: EnforcementReason::Spam,
                        nuke: true,
                    }
                } else {
                    Decision::None
                }
            }
        }
    }

    fn evaluate_nuke(
        &self,
        issuer: &str,
        mentions: &[String],
        formatted_body: Option<&str>,
    ) -> Decision {
        if !self.is_moderator(issuer) {
            tracing::info!(%issuer, "ignoring nuke from non-moderator");
            return Decision::None;
        }
        let Some(target) = self.parse_nuke_target(mentions, formatted_body) else {
            tracing::info!(%issuer, "nuke command had no parsable target");
            return Decision::None;
        };
        if self.is_moderator(&target) {
            tracing::info!(%issuer, %target, "refusing to nuke a moderator");
            return Decision::None;
        }
        Decision::Enforce {
            target,
            reason: EnforcementReason::Manual,
            nuke: true,
        }
    }

    /// Mention metadata wins; the rendered reply body is the fallback.
    fn parse_nuke_target(&self, mentions: &[String], formatted_body: Option<&str>) -> Option<String> {
        if let Some(first) = mentions.first() {
            return Some(first.clone());
        }
        let body = formatted_body?;
        self.profile_link
            .captures(body)
            .map(|caps| caps[1].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ModerationService {
        let moderators = ["@admin:example.org".to_string(), "@mod:example.org".to_string()]
            .into_iter()
            .collect();
        ModerationService::new(
            moderators,
            vec!["ban".to_string(), "scam".to_string()],
            vec!["troll".to_string()],
        )
    }

    fn message(sender: &str, body: &str) -> RoomEvent {
        RoomEvent::Message {
            sender: sender.to_string(),
            body: body.to_string(),
            formatted_body: None,
            mentions: Vec::new(),
        }
    }

    fn media(sender: &str) -> RoomEvent {
        RoomEvent::MediaPost {
            sender: sender.to_string(),
        }
    }

    fn join(sender: &str) -> RoomEvent {
        RoomEvent::MemberJoin {
            sender: sender.to_string(),
        }
    }

    fn nuke(sender: &str, mentions: Vec<String>, formatted_body: Option<&str>) -> RoomEvent {
        RoomEvent::Message {
            sender: sender.to_string(),
            body: NUKE_COMMAND.to_string(),
            formatted_body: formatted_body.map(str::to_string),
            mentions,
        }
    }

    #[test]
    fn moderators_are_exempt_from_term_checks() {
        let decision = service().evaluate(&message("@admin:example.org", "this is a scam"));
        assert_eq!(decision, Decision::None);
    }

    #[test]
    fn banned_term_matches_as_substring() {
        let decision = service().evaluate(&message("@user:example.org", "I like banana bread"));
        assert_eq!(
            decision,
            Decision::Enforce {
                target: "@user:example.org".to_string(),
                reason: EnforcementReason::Policy,
                nuke: false,
            }
        );
    }

    #[test]
    fn term_matching_is_case_sensitive() {
        let decision = service().evaluate(&message("@user:example.org", "BANANA SCAM"));
        assert_eq!(decision, Decision::None);
    }

    #[test]
    fn clean_message_passes() {
        let decision = service().evaluate(&message("@user:example.org", "hello there"));
        assert_eq!(decision, Decision::None);
    }

    #[test]
    fn banned_name_substring_fires_on_join() {
        let decision = service().evaluate(&join("@troll42:example.org"));
        assert_eq!(
            decision,
            Decision::Enforce {
                target: "@troll42:example.org".to_string(),
                reason: EnforcementReason::Policy,
                nuke: false,
            }
        );
        assert_eq!(service().evaluate(&join("@alice:example.org")), Decision::None);
    }

    #[test]
    fn media_burst_trips_on_the_eighth_post() {
        let service = service();
        for _ in 0..7 {
            assert_eq!(service.evaluate(&media("@user:example.org")), Decision::None);
        }
        let decision = service.evaluate(&media("@user:example.org"));
        assert_eq!(
            decision,
            Decision::Enforce {
                target: "@user:example.org".to_string(),
                reason: EnforcementReason::Spam,
                nuke: true,
            }
        );
    }

    #[test]
    fn moderator_media_is_never_counted() {
        let service = service();
        for _ in 0..20 {
            assert_eq!(service.evaluate(&media("@mod:example.org")), Decision::None);
        }
    }

    #[test]
    fn nuke_requires_a_moderator_issuer() {
        let event = nuke(
            "@user:example.org",
            vec!["@victim:example.org".to_string()],
            None,
        );
        assert_eq!(service().evaluate(&event), Decision::None);
    }

    #[test]
    fn nuke_never_targets_a_moderator() {
        let event = nuke(
            "@admin:example.org",
            vec!["@mod:example.org".to_string()],
            None,
        );
        assert_eq!(service().evaluate(&event), Decision::None);
    }

    #[test]
    fn nuke_uses_mention_metadata_first() {
        let event = nuke(
            "@admin:example.org",
            vec!["@victim:example.org".to_string()],
            Some(r#"<a href="https://matrix.to/#/@someone-else:example.org">reply</a>"#),
        );
        assert_eq!(
            service().evaluate(&event),
            Decision::Enforce {
                target: "@victim:example.org".to_string(),
                reason: EnforcementReason::Manual,
                nuke: true,
            }
        );
    }

    #[test]
    fn nuke_falls_back_to_profile_link_in_html_body() {
        let event = nuke(
            "@admin:example.org",
            Vec::new(),
            Some(
                r#"<mx-reply><blockquote><a href="https://matrix.to/#/@victim:example.org">victim</a> spam</blockquote></mx-reply>!nuke"#,
            ),
        );
        assert_eq!(
            service().evaluate(&event),
            Decision::Enforce {
                target: "@victim:example.org".to_string(),
                reason: EnforcementReason::Manual,
                nuke: true,
            }
        );
    }

    #[test]
    fn nuke_without_parsable_target_is_ignored() {
        let event = nuke("@admin:example.org", Vec::new(), Some("<b>no links here</b>"));
        assert_eq!(service().evaluate(&event), Decision::None);

        let event = nuke("@admin:example.org", Vec::new(), None);
        assert_eq!(service().evaluate(&event), Decision::None);
    }
}
