//! Roster summary statistics.
//!
//! A pure fold over the roster producing the numbers the dashboard's
//! summary cards render: tier headcounts, outstanding reconciliation work,
//! and an engagement rate. No rendering here - the host decides what a
//! card or a chart looks like.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::member::{Member, SyncStatus, Tier};

/// Headline numbers for the current roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStats {
    /// All members in the store, regardless of tier.
    pub total_members: usize,
    /// Members on the paid tier.
    pub paid_members: usize,
    /// Members on the provisional tier.
    pub provisional_members: usize,
    /// Members on the guest tier.
    pub guests: usize,
    /// Members on the viewer tier.
    pub viewers: usize,
    /// Members whose access has been removed (records are kept).
    pub removed_access: usize,
    /// Members with an edit waiting for the next dispatch.
    pub pending_changes: usize,
    /// Members flagged for operator review.
    pub review_needed: usize,
    /// Members whose last dispatch was rejected.
    pub sync_failed: usize,
    /// Percent of members active within the engagement window, 0..=100.
    pub engagement_rate: u8,
}

impl RosterStats {
    /// Fold the roster into summary stats.
    ///
    /// `now` and `window_days` are explicit so the numbers are
    /// reproducible in tests and stable within one render pass.
    pub fn collect<'a>(
        members: impl IntoIterator<Item = &'a Member>,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Self {
        let mut stats = Self::default();
        let window = chrono::Duration::days(window_days);
        let mut active = 0usize;

        for member in members {
            stats.total_members += 1;
            match member.tier {
                Tier::PaidMember => stats.paid_members += 1,
                Tier::ProvisionalMember => stats.provisional_members += 1,
                Tier::Guest => stats.guests += 1,
                Tier::Viewer => stats.viewers += 1,
                Tier::RemovedAccess => stats.removed_access += 1,
            }
            if member.sync_status.is_pending() {
                stats.pending_changes += 1;
            }
            match member.sync_status {
                SyncStatus::ReviewNeeded => stats.review_needed += 1,
                SyncStatus::SyncFailed => stats.sync_failed += 1,
                _ => {}
            }
            if now.signed_duration_since(member.last_active_at) <= window {
                active += 1;
            }
        }

        if stats.total_members > 0 {
            stats.engagement_rate = ((active * 100) / stats.total_members) as u8;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberId;
    use chrono::NaiveDate;

    fn member_active_days_ago(tier: Tier, status: SyncStatus, days: i64) -> Member {
        let now = Utc::now();
        Member::from_roster(
            MemberId::new(),
            "Member",
            tier,
            status,
            now - chrono::Duration::days(days),
            "",
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
        )
    }

    #[test]
    fn test_empty_roster_is_all_zero() {
        let stats = RosterStats::collect([].iter(), Utc::now(), 30);
        assert_eq!(stats, RosterStats::default());
    }

    #[test]
    fn test_tier_and_status_counts() {
        let members = vec![
            member_active_days_ago(Tier::PaidMember, SyncStatus::InSync, 2),
            member_active_days_ago(Tier::ProvisionalMember, SyncStatus::PendingUpgrade, 5),
            member_active_days_ago(Tier::Guest, SyncStatus::RemoveAccessRequested, 10),
            member_active_days_ago(Tier::Viewer, SyncStatus::InSync, 1),
            member_active_days_ago(Tier::ProvisionalMember, SyncStatus::ReviewNeeded, 8),
        ];
        let stats = RosterStats::collect(&members, Utc::now(), 30);

        assert_eq!(stats.total_members, 5);
        assert_eq!(stats.paid_members, 1);
        assert_eq!(stats.provisional_members, 2);
        assert_eq!(stats.guests, 1);
        assert_eq!(stats.viewers, 1);
        assert_eq!(stats.pending_changes, 1);
        assert_eq!(stats.review_needed, 1);
        assert_eq!(stats.sync_failed, 0);
        // Everyone above was active within 30 days.
        assert_eq!(stats.engagement_rate, 100);
    }

    #[test]
    fn test_engagement_rate_respects_window() {
        let members = vec![
            member_active_days_ago(Tier::PaidMember, SyncStatus::InSync, 2),
            member_active_days_ago(Tier::PaidMember, SyncStatus::InSync, 45),
            member_active_days_ago(Tier::PaidMember, SyncStatus::InSync, 90),
            member_active_days_ago(Tier::PaidMember, SyncStatus::InSync, 1),
        ];
        let stats = RosterStats::collect(&members, Utc::now(), 30);
        assert_eq!(stats.engagement_rate, 50);
    }
}
