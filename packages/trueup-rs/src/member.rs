//! Member data model and per-member sync transitions.
//!
//! A [`Member`] is one account under administration. Two fields carry the
//! reconciliation state machine:
//!
//! - `tier` - the membership class the operator has assigned
//! - `sync_status` - whether that assignment matches what the membership
//!   system of record has confirmed
//!
//! All transitions funnel through three methods:
//!
//! - [`Member::assign_tier`] - operator edits (single or bulk)
//! - [`Member::confirm_sync`] - dispatch confirmed this member
//! - [`Member::reject_sync`] - dispatch rejected this member
//!
//! Nothing else writes `sync_status`, which is what keeps the core
//! invariant honest: a member is never `Synced` with an un-pushed edit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Member Id
// =============================================================================

/// Stable unique identifier for a member.
///
/// Every lookup and bulk edit keys on `MemberId`. Display names are not
/// unique and table positions shift under filtering, so neither is ever
/// used as an identity.
///
/// # Example
///
/// ```ignore
/// use trueup::MemberId;
///
/// let id = MemberId::new();
/// let same = MemberId::from(*id.as_uuid());
/// assert_eq!(id, same);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(Uuid);

impl MemberId {
    /// Create a new random member id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get a reference to the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MemberId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tier
// =============================================================================

/// The membership class assigned to a member.
///
/// `RemovedAccess` is a tier, not a deletion: revoking access keeps the
/// record (and its history) in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PaidMember,
    ProvisionalMember,
    Guest,
    Viewer,
    RemovedAccess,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::PaidMember => "Paid Member",
            Tier::ProvisionalMember => "Provisional Member",
            Tier::Guest => "Guest",
            Tier::Viewer => "Viewer",
            Tier::RemovedAccess => "Removed Access",
        };
        write!(f, "{label}")
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Per-member flag tracking whether the assigned tier matches what the
/// system of record has confirmed.
///
/// `PendingSync` and `PendingUpgrade` are the dispatchable subset: the next
/// batch dispatch submits exactly the members in one of those two states.
///
/// `ReviewNeeded` and `RemoveAccessRequested` arrive from roster load and
/// are only ever left by an explicit tier assignment - the engine never
/// resolves a review on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Tier matches the last confirmed value; nothing to push.
    InSync,
    /// Roster-supplied: an upgrade is awaiting confirmation upstream.
    PendingUpgrade,
    /// Tier was edited locally and has not been confirmed.
    PendingSync,
    /// The last dispatch confirmed this member's tier.
    Synced,
    /// Roster-supplied: activity does not match the assigned tier.
    ReviewNeeded,
    /// Roster-supplied: an access removal is awaiting operator action.
    RemoveAccessRequested,
    /// The last dispatch rejected this member; the edit is retained.
    SyncFailed,
}

impl SyncStatus {
    /// Whether this member belongs in the next dispatch batch.
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncStatus::PendingSync | SyncStatus::PendingUpgrade)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::InSync => "In Sync",
            SyncStatus::PendingUpgrade => "Pending Upgrade",
            SyncStatus::PendingSync => "Pending Sync",
            SyncStatus::Synced => "Synced",
            SyncStatus::ReviewNeeded => "Review Needed",
            SyncStatus::RemoveAccessRequested => "Remove Access Requested",
            SyncStatus::SyncFailed => "Sync Failed",
        };
        write!(f, "{label}")
    }
}

// =============================================================================
// Member
// =============================================================================

/// One user account under administration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Unique identifier. Never reused, never positional.
    pub id: MemberId,

    /// Display name. Not unique; display-only.
    pub name: String,

    /// Currently assigned membership tier.
    pub tier: Tier,

    /// Reconciliation state for this member.
    pub sync_status: SyncStatus,

    /// The tier last confirmed by the system of record, if any.
    ///
    /// This is the baseline for the revert rule: assigning this exact tier
    /// back returns the member to `InSync` without a round trip. `None`
    /// means no assignment has ever been confirmed for this member.
    pub last_synced_tier: Option<Tier>,

    /// Reason the last dispatch rejected this member, if it did.
    ///
    /// Kept so a failed edit stays visibly actionable; cleared by the next
    /// assignment or confirmation.
    pub sync_error: Option<String>,

    /// Last observed activity.
    pub last_active_at: DateTime<Utc>,

    /// Free-text description of recent activity. Display-only.
    pub last_activity_summary: String,

    /// Date the account was created.
    pub member_since: NaiveDate,
}

impl Member {
    /// Build a member as the roster loader supplies it.
    ///
    /// The confirmed baseline is inferred from the supplied status: a
    /// member arriving `InSync`, `Synced`, or `ReviewNeeded` was shown to
    /// us with a confirmed assignment; the pending and failed states carry
    /// no baseline, so any edit to them is a real change.
    pub fn from_roster(
        id: MemberId,
        name: impl Into<String>,
        tier: Tier,
        sync_status: SyncStatus,
        last_active_at: DateTime<Utc>,
        last_activity_summary: impl Into<String>,
        member_since: NaiveDate,
    ) -> Self {
        let last_synced_tier = match sync_status {
            SyncStatus::InSync | SyncStatus::Synced | SyncStatus::ReviewNeeded => Some(tier),
            SyncStatus::PendingUpgrade
            | SyncStatus::PendingSync
            | SyncStatus::RemoveAccessRequested
            | SyncStatus::SyncFailed => None,
        };
        Self {
            id,
            name: name.into(),
            tier,
            sync_status,
            last_synced_tier,
            sync_error: None,
            last_active_at,
            last_activity_summary: last_activity_summary.into(),
            member_since,
        }
    }

    /// Apply an operator tier assignment.
    ///
    /// Assigning the confirmed baseline back is a revert: the member
    /// returns to `InSync` with nothing to push. Any other assignment
    /// (including re-assigning an already-pending tier) leaves the member
    /// `PendingSync`. Repeating the same assignment never flaps the status.
    ///
    /// Returns the resulting status.
    pub fn assign_tier(&mut self, new_tier: Tier) -> SyncStatus {
        self.tier = new_tier;
        self.sync_error = None;
        self.sync_status = if self.last_synced_tier == Some(new_tier) {
            SyncStatus::InSync
        } else {
            SyncStatus::PendingSync
        };
        self.sync_status
    }

    /// Settle a dispatch confirmation for this member.
    ///
    /// The submitted tier becomes the confirmed baseline. Only the
    /// dispatcher calls this; it is the single place `Synced` is ever set.
    pub(crate) fn confirm_sync(&mut self) {
        self.last_synced_tier = Some(self.tier);
        self.sync_error = None;
        self.sync_status = SyncStatus::Synced;
    }

    /// Settle a dispatch rejection for this member.
    ///
    /// The attempted tier is retained so the edit is not silently dropped;
    /// the member stays actionable and eligible for retry.
    pub(crate) fn reject_sync(&mut self, reason: impl Into<String>) {
        self.sync_error = Some(reason.into());
        self.sync_status = SyncStatus::SyncFailed;
    }

    /// Re-queue a failed edit without changing the attempted tier.
    pub(crate) fn retry_sync(&mut self) -> SyncStatus {
        if self.sync_status == SyncStatus::SyncFailed {
            self.sync_status = SyncStatus::PendingSync;
        }
        self.sync_status
    }
}

// =============================================================================
// Member Diff
// =============================================================================

/// A partial update for one member.
///
/// Only the fields present are applied; everything else is left untouched.
/// A present `tier` flows through [`Member::assign_tier`], so the sync
/// state machine holds no matter which entry point performed the edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberDiff {
    /// Member to patch.
    pub id: MemberId,
    /// Replacement display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tier assignment, applied via the standard transition rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Refreshed activity timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    /// Refreshed activity summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_summary: Option<String>,
}

impl MemberDiff {
    /// Start an empty diff for the given member.
    pub fn for_member(id: MemberId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the tier assignment.
    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Set the activity timestamp.
    pub fn last_active_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_active_at = Some(at);
        self
    }

    /// Set the activity summary.
    pub fn last_activity_summary(mut self, summary: impl Into<String>) -> Self {
        self.last_activity_summary = Some(summary.into());
        self
    }

    /// Whether the diff would touch the sync state machine.
    pub fn touches_tier(&self) -> bool {
        self.tier.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paid_member(status: SyncStatus) -> Member {
        Member::from_roster(
            MemberId::new(),
            "Jane Cooper",
            Tier::PaidMember,
            status,
            Utc::now(),
            "3 uploaded docs, 2 shared workspaces",
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
        )
    }

    #[test]
    fn test_assign_new_tier_goes_pending() {
        let mut member = paid_member(SyncStatus::InSync);
        let status = member.assign_tier(Tier::Viewer);
        assert_eq!(status, SyncStatus::PendingSync);
        assert_eq!(member.tier, Tier::Viewer);
        // Baseline is untouched until a dispatch confirms.
        assert_eq!(member.last_synced_tier, Some(Tier::PaidMember));
    }

    #[test]
    fn test_assign_baseline_tier_reverts_to_in_sync() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::Viewer);
        let status = member.assign_tier(Tier::PaidMember);
        assert_eq!(status, SyncStatus::InSync);
    }

    #[test]
    fn test_assign_is_idempotent() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::Guest);
        let before = member.sync_status;
        member.assign_tier(Tier::Guest);
        assert_eq!(member.sync_status, before);
    }

    #[test]
    fn test_review_needed_resolved_by_same_tier() {
        // A ReviewNeeded member has a confirmed baseline; re-affirming it
        // resolves the review with nothing to push.
        let mut member = paid_member(SyncStatus::ReviewNeeded);
        let status = member.assign_tier(Tier::PaidMember);
        assert_eq!(status, SyncStatus::InSync);
    }

    #[test]
    fn test_no_baseline_means_any_assignment_is_pending() {
        let mut member = paid_member(SyncStatus::PendingUpgrade);
        assert_eq!(member.last_synced_tier, None);
        let status = member.assign_tier(Tier::PaidMember);
        assert_eq!(status, SyncStatus::PendingSync);
    }

    #[test]
    fn test_confirm_sync_moves_baseline() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::Viewer);
        member.confirm_sync();
        assert_eq!(member.sync_status, SyncStatus::Synced);
        assert_eq!(member.last_synced_tier, Some(Tier::Viewer));

        // Reverting now targets the new baseline.
        let status = member.assign_tier(Tier::Viewer);
        assert_eq!(status, SyncStatus::InSync);
    }

    #[test]
    fn test_reject_keeps_attempted_tier() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::RemovedAccess);
        member.reject_sync("tier not permitted");
        assert_eq!(member.sync_status, SyncStatus::SyncFailed);
        assert_eq!(member.tier, Tier::RemovedAccess);
        assert_eq!(member.sync_error.as_deref(), Some("tier not permitted"));
    }

    #[test]
    fn test_retry_requeues_failed_member() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::Guest);
        member.reject_sync("seat limit reached");
        let status = member.retry_sync();
        assert_eq!(status, SyncStatus::PendingSync);
        assert_eq!(member.tier, Tier::Guest);
    }

    #[test]
    fn test_retry_is_a_noop_unless_failed() {
        let mut member = paid_member(SyncStatus::InSync);
        let status = member.retry_sync();
        assert_eq!(status, SyncStatus::InSync);
    }

    #[test]
    fn test_assignment_clears_stale_rejection() {
        let mut member = paid_member(SyncStatus::InSync);
        member.assign_tier(Tier::Guest);
        member.reject_sync("seat limit reached");
        member.assign_tier(Tier::Viewer);
        assert_eq!(member.sync_error, None);
        assert_eq!(member.sync_status, SyncStatus::PendingSync);
    }

    #[test]
    fn test_pending_subset() {
        assert!(SyncStatus::PendingSync.is_pending());
        assert!(SyncStatus::PendingUpgrade.is_pending());
        assert!(!SyncStatus::InSync.is_pending());
        assert!(!SyncStatus::Synced.is_pending());
        assert!(!SyncStatus::ReviewNeeded.is_pending());
        assert!(!SyncStatus::RemoveAccessRequested.is_pending());
        assert!(!SyncStatus::SyncFailed.is_pending());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(Tier::PaidMember.to_string(), "Paid Member");
        assert_eq!(SyncStatus::PendingUpgrade.to_string(), "Pending Upgrade");
        assert_eq!(SyncStatus::ReviewNeeded.to_string(), "Review Needed");
    }
}
