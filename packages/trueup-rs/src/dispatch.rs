//! Batch dispatch boundary: submission payloads, the reconciliation
//! collaborator trait, and the settled report.
//!
//! A dispatch is one submission of every currently pending tier change to
//! the membership system of record. The engine does not pretend the batch
//! is atomic: the collaborator answers per member, and the engine settles
//! each answer independently - confirmed members become `Synced`, rejected
//! members become `SyncFailed` with the edit retained. One rejection never
//! aborts the rest of the batch.
//!
//! The payload shape below is the whole wire contract. Transport is the
//! host's concern; HTTP, gRPC, or an in-process fake all implement
//! [`ReconciliationApi`] the same way.

use serde::{Deserialize, Serialize};

use crate::member::{MemberId, Tier};

// =============================================================================
// Submission payload
// =============================================================================

/// One member's requested tier change within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionItem {
    /// Member the change applies to.
    pub id: MemberId,
    /// Tier the operator wants confirmed.
    pub requested_tier: Tier,
}

/// Per-member answer from the reconciliation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Member this answer is about.
    pub id: MemberId,
    /// What the service decided.
    pub outcome: Outcome,
}

/// What the reconciliation service decided for one member.
///
/// `Rejected` is a normal result value, not an error: a real membership
/// system refuses tier changes for business reasons (seat limits, billing
/// state) while happily confirming the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Outcome {
    /// The requested tier is now the member's tier of record.
    Confirmed,
    /// The service refused the change; the reason is host-displayable.
    Rejected {
        /// Why the change was refused.
        reason: String,
    },
}

// =============================================================================
// Reconciliation collaborator
// =============================================================================

/// The external reconciliation submission API.
///
/// Supplied by the host application; the engine calls it exactly once per
/// dispatch with the full pending batch. A wholesale `Err` means the
/// service was unreachable (transport failure) - the engine then mutates
/// nothing and retries the same batch on the next dispatch. Partial
/// application-level refusal is expressed per member via
/// [`Outcome::Rejected`], never via `Err`.
///
/// # Example Implementation
///
/// ```ignore
/// use trueup::{ReconciliationApi, SubmissionItem, SubmissionOutcome};
///
/// struct HttpReconciliation { client: reqwest::Client, base: String }
///
/// #[async_trait::async_trait]
/// impl ReconciliationApi for HttpReconciliation {
///     async fn submit(
///         &self,
///         batch: Vec<SubmissionItem>,
///     ) -> anyhow::Result<Vec<SubmissionOutcome>> {
///         let resp = self
///             .client
///             .post(format!("{}/api/members/true-up", self.base))
///             .json(&batch)
///             .send()
///             .await?
///             .error_for_status()?;
///         Ok(resp.json().await?)
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ReconciliationApi: Send + Sync + 'static {
    /// Submit a batch of requested tier changes.
    ///
    /// Must answer every submitted id, in any order. Answers for ids that
    /// were not submitted are ignored by the engine; submitted ids with no
    /// answer remain pending and go out again with the next batch.
    async fn submit(&self, batch: Vec<SubmissionItem>) -> anyhow::Result<Vec<SubmissionOutcome>>;
}

// =============================================================================
// Dispatch report
// =============================================================================

/// What actually happened during one dispatch.
///
/// Reports truth, not intent: counts reflect the answers the service gave,
/// member by member. An empty roster of pending changes produces the
/// default report (`synced == 0`) without contacting the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// How many members were submitted in the batch.
    pub submitted: usize,
    /// How many the service confirmed.
    pub synced: usize,
    /// How many the service rejected.
    pub failed: usize,
    /// Submitted members the service did not answer for; still pending.
    pub unresolved: usize,
}

impl DispatchReport {
    /// Whether every submitted member was confirmed.
    pub fn is_clean(&self) -> bool {
        self.synced == self.submitted
    }

    /// Whether the batch had nothing to submit.
    pub fn is_empty(&self) -> bool {
        self.submitted == 0
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dispatch settled: {} submitted, {} synced, {} failed, {} unresolved",
            self.submitted, self.synced, self.failed, self.unresolved
        )
    }
}
