// Identity classification for bridged senders.
//
// The bridge surfaces Discord users on Matrix under handles wrapped with a
// fixed prefix and homeserver suffix (e.g. `@_discord_123:t2bot.io`).
// Classification is a pure string transform; nothing here touches the network.

/// Where a sender actually lives, as recovered from their Matrix handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderIdentity {
    /// A native Matrix user. The handle is carried through unchanged.
    Origin { user_id: String },
    /// A Discord user surfaced through the bridge. `native_id` is the
    /// Discord snowflake recovered from inside the wrapped handle.
    Bridged { user_id: String, native_id: String },
}

/// Classifies Matrix handles against the bridge's wrapping convention.
#[derive(Debug, Clone)]
pub struct BridgeIdentity {
    prefix: String,
    suffix: String,
}

impl BridgeIdentity {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Exact-match on both prefix and suffix, no case normalization. A
    /// handle matching only one of the two is treated as a native Matrix
    /// user, so enforcement never reaches the bridged side for it.
    pub fn classify(&self, handle: &str) -> SenderIdentity {
        if let Some(rest) = handle.strip_prefix(&self.prefix) {
            if let Some(native_id) = rest.strip_suffix(&self.suffix) {
                return SenderIdentity::Bridged {
                    user_id: handle.to_string(),
                    native_id: native_id.to_string(),
                };
            }
        }
        SenderIdentity::Origin {
            user_id: handle.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> BridgeIdentity {
        BridgeIdentity::new("@_discord_", ":t2bot.io")
    }

    #[test]
    fn wrapped_handle_recovers_native_id() {
        let classified = identity().classify("@_discord_123456789:t2bot.io");
        assert_eq!(
            classified,
            SenderIdentity::Bridged {
                user_id: "@_discord_123456789:t2bot.io".to_string(),
                native_id: "123456789".to_string(),
            }
        );
    }

    #[test]
    fn plain_matrix_handle_is_origin_native() {
        let classified = identity().classify("@alice:example.org");
        assert_eq!(
            classified,
            SenderIdentity::Origin {
                user_id: "@alice:example.org".to_string(),
            }
        );
    }

    #[test]
    fn prefix_without_suffix_is_not_bridged() {
        let classified = identity().classify("@_discord_123456789:someplace.org");
        assert_eq!(
            classified,
            SenderIdentity::Origin {
                user_id: "@_discord_123456789:someplace.org".to_string(),
            }
        );
    }

    #[test]
    fn suffix_without_prefix_is_not_bridged() {
        let classified = identity().classify("@alice:t2bot.io");
        assert_eq!(
            classified,
            SenderIdentity::Origin {
                user_id: "@alice:t2bot.io".to_string(),
            }
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classified = identity().classify("@_Discord_123456789:t2bot.io");
        assert!(matches!(classified, SenderIdentity::Origin { .. }));
    }
}
