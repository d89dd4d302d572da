//! Session-start collaborators: identity and roster loading.
//!
//! The engine is a library behind a dashboard; the host supplies who is
//! signed in and what the roster looks like. Both are narrow async traits
//! so production wiring (Cognito, an HTTP roster endpoint) and test wiring
//! (canned values) look identical to the engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::member::Member;

/// Marker error a [`RosterSource`] or [`IdentityProvider`] returns when the
/// session is not signed in.
///
/// The engine downcasts for this and surfaces
/// [`TrueUpError::AuthenticationRequired`](crate::TrueUpError::AuthenticationRequired);
/// redirecting to sign-in is the host's job.
#[derive(Debug, Clone, Copy, Error)]
#[error("authentication required")]
pub struct AuthenticationRequired;

/// Supplies the signed-in operator's identity at session start.
///
/// The engine treats the email as an opaque label for logging and session
/// context; it never validates or parses credentials.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// The signed-in operator's email.
    ///
    /// Return [`AuthenticationRequired`] (via `anyhow`) when no session is
    /// active.
    async fn operator_email(&self) -> anyhow::Result<String>;
}

/// Supplies the initial ordered roster at session start.
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync + 'static {
    /// Load the full member roster, in display order.
    ///
    /// Return [`AuthenticationRequired`] (via `anyhow`) when no session is
    /// active; any other error is surfaced as a roster availability
    /// failure.
    async fn load(&self) -> anyhow::Result<Vec<Member>>;
}

/// The operator context captured once when the engine starts.
#[derive(Debug, Clone)]
pub struct OperatorSession {
    /// Signed-in operator's email, as the identity provider supplied it.
    pub email: String,
    /// When this session's engine was started.
    pub started_at: DateTime<Utc>,
}

impl OperatorSession {
    pub(crate) fn begin(email: String) -> Self {
        Self {
            email,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_required_is_downcastable() {
        let err: anyhow::Error = AuthenticationRequired.into();
        assert!(err.downcast_ref::<AuthenticationRequired>().is_some());
    }

    #[test]
    fn test_session_captures_email() {
        let session = OperatorSession::begin("ops@alignsync.example".into());
        assert_eq!(session.email, "ops@alignsync.example");
        assert!(session.started_at <= Utc::now());
    }
}
