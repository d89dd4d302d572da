//! Roster filtering for the visible view.
//!
//! The visible view is a pure function of (store, query): a member is shown
//! iff its name contains the search term case-insensitively AND its status
//! passes the filter. The view is recomputed in full on every query change
//! rather than incrementally patched - rosters are administrative-scale
//! (hundreds to low thousands), and a full walk keeps the ordering contract
//! trivially true: rows appear in roster order, never resorted.

use serde::{Deserialize, Serialize};

use crate::member::{Member, SyncStatus};
use crate::store::MemberStore;

/// Status half of a roster query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Every status passes.
    #[default]
    All,
    /// Only members in exactly this status pass.
    Only(SyncStatus),
}

impl StatusFilter {
    fn matches(&self, status: SyncStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => status == *wanted,
        }
    }
}

/// A roster query: search term plus status filter.
///
/// The default query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterQuery {
    /// Case-insensitive substring matched against member names.
    pub search_term: String,
    /// Status filter applied after the name match.
    pub status_filter: StatusFilter,
}

impl RosterQuery {
    /// Query by search term only.
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search_term: term.into(),
            status_filter: StatusFilter::All,
        }
    }

    /// Query by status only.
    pub fn with_status(status: SyncStatus) -> Self {
        Self {
            search_term: String::new(),
            status_filter: StatusFilter::Only(status),
        }
    }

    /// Narrow this query to a status.
    pub fn and_status(mut self, status: SyncStatus) -> Self {
        self.status_filter = StatusFilter::Only(status);
        self
    }

    /// Whether a member passes this query.
    pub fn matches(&self, member: &Member) -> bool {
        self.status_filter.matches(member.sync_status)
            && member
                .name
                .to_lowercase()
                .contains(&self.search_term.to_lowercase())
    }
}

/// The members visible under a query, in roster insertion order.
///
/// Lazy and restartable: nothing is cached, so callers can re-run the walk
/// whenever the query or the roster changes.
pub fn visible<'a, 'q>(
    store: &'a MemberStore,
    query: &'q RosterQuery,
) -> impl Iterator<Item = &'a Member> + use<'a, 'q> {
    store.list().filter(|member| query.matches(member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberId, Tier};
    use chrono::{NaiveDate, Utc};

    fn roster() -> MemberStore {
        let seed = [
            ("Jane Cooper", Tier::PaidMember, SyncStatus::InSync),
            ("Wade Warren", Tier::ProvisionalMember, SyncStatus::PendingUpgrade),
            ("Robert Fox", Tier::Guest, SyncStatus::RemoveAccessRequested),
            ("Theresa Webb", Tier::Viewer, SyncStatus::InSync),
            ("Devon Lane", Tier::ProvisionalMember, SyncStatus::PendingUpgrade),
        ];
        let mut store = MemberStore::new();
        for (name, tier, status) in seed {
            store
                .insert(Member::from_roster(
                    MemberId::new(),
                    name,
                    tier,
                    status,
                    Utc::now(),
                    "",
                    NaiveDate::from_ymd_opt(2023, 5, 5).unwrap(),
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_default_query_matches_everything() {
        let store = roster();
        assert_eq!(visible(&store, &RosterQuery::default()).count(), 5);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let store = roster();
        let names: Vec<&str> = visible(&store, &RosterQuery::search("DEVON"))
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["Devon Lane"]);
    }

    #[test]
    fn test_substring_hits_mid_name() {
        let store = roster();
        // "de" is a substring of both "Wade" and "Devon".
        let names: Vec<&str> = visible(&store, &RosterQuery::search("de"))
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["Wade Warren", "Devon Lane"]);
    }

    #[test]
    fn test_search_and_status_combine() {
        let store = roster();
        let query = RosterQuery::search("de").and_status(SyncStatus::PendingUpgrade);
        let names: Vec<&str> = visible(&store, &query).map(|m| m.name.as_str()).collect();
        // Both Wade Warren and Devon Lane contain "de" and are pending.
        assert_eq!(names, ["Wade Warren", "Devon Lane"]);
    }

    #[test]
    fn test_status_filter_only() {
        let store = roster();
        let query = RosterQuery::with_status(SyncStatus::InSync);
        let names: Vec<&str> = visible(&store, &query).map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Jane Cooper", "Theresa Webb"]);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let store = roster();
        assert_eq!(visible(&store, &RosterQuery::search("zzz")).count(), 0);
    }

    #[test]
    fn test_visible_keeps_roster_order_after_edits() {
        let mut store = roster();
        let ids: Vec<MemberId> = store.ids().collect();
        // Edit the last member; it must not float to the top.
        store.get_mut(ids[4]).unwrap().assign_tier(Tier::PaidMember);
        let names: Vec<&str> = visible(&store, &RosterQuery::default())
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["Jane Cooper", "Wade Warren", "Robert Fox", "Theresa Webb", "Devon Lane"]
        );
    }
}
