//! Structured error types for engine operations.
//!
//! `TrueUpError` provides pattern-matchable errors instead of generic
//! `anyhow::Error`, so hosts can route each failure to the right
//! notification.
//!
//! # Propagation rules
//!
//! - Validation failures (`NotFound`, `Conflict`, `DispatchInProgress`) are
//!   reported before any mutation. The store is never left partially
//!   updated.
//! - `DispatchTransport` guarantees every member's sync status is exactly
//!   as it was pre-dispatch; the whole batch is retried on the next
//!   dispatch.
//! - Per-member rejections are **not** errors. They are normal
//!   [`Outcome`](crate::Outcome) values the dispatcher settles member by
//!   member.
//!
//! # Example
//!
//! ```ignore
//! use trueup::TrueUpError;
//!
//! match engine.set_tier(id, Tier::Viewer) {
//!     Ok(status) => println!("now {status}"),
//!     Err(TrueUpError::Conflict { id }) => {
//!         println!("{id} is mid-dispatch, try again shortly");
//!     }
//!     Err(e) => eprintln!("edit rejected: {e}"),
//! }
//! ```

use thiserror::Error;

use crate::member::MemberId;

/// Structured error type for engine operations.
#[derive(Debug, Error)]
pub enum TrueUpError {
    /// An operation referenced a member id not present in the store.
    ///
    /// For bulk operations this is raised before any member is mutated.
    #[error("member {id} not found")]
    NotFound {
        /// The unknown member id.
        id: MemberId,
    },

    /// A roster supplied the same member id twice.
    #[error("duplicate member id {id} in roster")]
    DuplicateId {
        /// The repeated member id.
        id: MemberId,
    },

    /// An edit targeted a member whose sync result is in flight.
    ///
    /// Accepting the edit would let a stale dispatch outcome overwrite it;
    /// retry once the in-flight dispatch settles.
    #[error("member {id} has a sync result in flight")]
    Conflict {
        /// The in-flight member id.
        id: MemberId,
    },

    /// A dispatch was requested while another is outstanding.
    ///
    /// Batches are never silently merged.
    #[error("a dispatch is already in progress")]
    DispatchInProgress,

    /// The reconciliation service could not be reached, timed out, or
    /// failed wholesale.
    ///
    /// No member state changed; the batch stays pending in full.
    #[error("dispatch transport failure: {message}")]
    DispatchTransport {
        /// What went wrong reaching the service.
        message: String,
    },

    /// The identity or roster collaborator demands a signed-in session.
    ///
    /// The host handles this by redirecting to sign-in; the engine does
    /// not.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The roster could not be loaded for a non-authentication reason.
    #[error("roster unavailable: {message}")]
    RosterUnavailable {
        /// The underlying load failure.
        message: String,
    },
}

impl TrueUpError {
    /// Whether retrying the same operation later can succeed without the
    /// operator changing anything.
    ///
    /// Transport and in-flight failures clear on their own; validation
    /// failures (`NotFound`, `DuplicateId`) need a different request.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            TrueUpError::Conflict { .. }
                | TrueUpError::DispatchInProgress
                | TrueUpError::DispatchTransport { .. }
                | TrueUpError::RosterUnavailable { .. }
        )
    }
}
