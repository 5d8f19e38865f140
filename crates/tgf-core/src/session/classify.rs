use crate::errors::Error;

/// Retry-relevant kind of a failed upstream call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient flood control; the session is fine after `wait_secs`.
    RateLimited { wait_secs: u32 },
    /// The credential is dead everywhere (banned or deauthorized account).
    SessionInvalid { reason: String },
    /// The credential works but may not touch this target.
    ScopeDenied,
    /// Anything else. Not retried.
    Unknown,
}

impl FailureKind {
    /// Whether another attempt on a (possibly different) session makes sense.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether the session that produced the failure must leave the pool.
    pub fn evicts_session(&self) -> bool {
        matches!(self, Self::SessionInvalid { .. })
    }
}

// Upstream RPC error names. Extending this table is a deliberate decision:
// an unlisted name is `Unknown` and fails the request immediately.
const FLOOD_WAIT: &str = "FLOOD_WAIT";
const USER_DEACTIVATED_BAN: &str = "USER_DEACTIVATED_BAN";
const AUTH_KEY_UNREGISTERED: &str = "AUTH_KEY_UNREGISTERED";
const USER_BANNED_IN_CHANNEL: &str = "USER_BANNED_IN_CHANNEL";

/// Map an operation error to its failure kind. Pure: the same error always
/// classifies the same way.
pub fn classify(err: &Error) -> FailureKind {
    let Error::Rpc { name, value, .. } = err else {
        return FailureKind::Unknown;
    };

    match name.as_str() {
        FLOOD_WAIT => FailureKind::RateLimited {
            wait_secs: value.unwrap_or(0),
        },
        USER_DEACTIVATED_BAN | AUTH_KEY_UNREGISTERED => FailureKind::SessionInvalid {
            reason: name.clone(),
        },
        USER_BANNED_IN_CHANNEL => FailureKind::ScopeDenied,
        _ => FailureKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_wait_carries_the_wait_hint() {
        assert_eq!(
            classify(&Error::rpc(420, "FLOOD_WAIT", Some(30))),
            FailureKind::RateLimited { wait_secs: 30 }
        );
        assert_eq!(
            classify(&Error::rpc(420, "FLOOD_WAIT", None)),
            FailureKind::RateLimited { wait_secs: 0 }
        );
    }

    #[test]
    fn dead_credentials_are_session_invalid() {
        for name in ["USER_DEACTIVATED_BAN", "AUTH_KEY_UNREGISTERED"] {
            let kind = classify(&Error::rpc(401, name, None));
            assert_eq!(
                kind,
                FailureKind::SessionInvalid {
                    reason: name.to_string()
                }
            );
            assert!(kind.evicts_session());
        }
    }

    #[test]
    fn channel_ban_is_scope_denied_and_keeps_the_session() {
        let kind = classify(&Error::rpc(400, "USER_BANNED_IN_CHANNEL", None));
        assert_eq!(kind, FailureKind::ScopeDenied);
        assert!(kind.is_retryable());
        assert!(!kind.evicts_session());
    }

    #[test]
    fn everything_else_is_unknown() {
        for err in [
            Error::rpc(400, "CHANNEL_PRIVATE", None),
            Error::rpc(401, "SESSION_REVOKED", None),
            Error::rpc(420, "FLOOD_PREMIUM_WAIT", Some(5)),
            Error::NotFound("nope".into()),
            Error::External("io".into()),
            Error::RateLimited {
                retry_after_secs: 5,
            },
        ] {
            let kind = classify(&err);
            assert_eq!(kind, FailureKind::Unknown, "{err}");
            assert!(!kind.is_retryable());
        }
    }

    #[test]
    fn classification_is_stable() {
        let err = Error::rpc(420, "FLOOD_WAIT", Some(12));
        assert_eq!(classify(&err), classify(&err));
    }
}
