//! In-memory member record store.
//!
//! The store is the authoritative roster for the current session: an
//! id-indexed map that preserves roster insertion order. Both halves of
//! that sentence are contracts:
//!
//! - **Id-indexed**: every lookup and edit keys on [`MemberId`]. Positional
//!   access does not exist, so a filtered or re-sorted view can never edit
//!   the wrong row.
//! - **Insertion-ordered**: [`MemberStore::list`] walks members in roster
//!   order regardless of how tiers and statuses have changed, so an
//!   in-progress edit never reorders rows under the operator.
//!
//! Members are never deleted; revoking access is the `RemovedAccess` tier.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::TrueUpError;
use crate::member::{Member, MemberDiff, MemberId};

/// Authoritative, insertion-ordered collection of members.
#[derive(Debug, Default)]
pub struct MemberStore {
    members: IndexMap<MemberId, Member>,
}

impl MemberStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an ordered roster.
    ///
    /// Fails with [`TrueUpError::DuplicateId`] if the roster repeats an id;
    /// uniqueness is the invariant every other operation leans on, so it is
    /// enforced at the door rather than papered over with last-write-wins.
    pub fn from_roster(roster: Vec<Member>) -> Result<Self, TrueUpError> {
        let mut store = Self::new();
        for member in roster {
            store.insert(member)?;
        }
        Ok(store)
    }

    /// Add a member to the end of the roster order.
    pub fn insert(&mut self, member: Member) -> Result<(), TrueUpError> {
        let id = member.id;
        if self.members.contains_key(&id) {
            return Err(TrueUpError::DuplicateId { id });
        }
        self.members.insert(id, member);
        Ok(())
    }

    /// Look up a member by id.
    pub fn get(&self, id: MemberId) -> Result<&Member, TrueUpError> {
        self.members.get(&id).ok_or(TrueUpError::NotFound { id })
    }

    /// Look up a member by id, mutably.
    pub(crate) fn get_mut(&mut self, id: MemberId) -> Result<&mut Member, TrueUpError> {
        self.members
            .get_mut(&id)
            .ok_or(TrueUpError::NotFound { id })
    }

    /// Iterate members in roster insertion order.
    pub fn list(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Clone the full roster in insertion order.
    pub fn members(&self) -> Vec<Member> {
        self.members.values().cloned().collect()
    }

    /// Iterate member ids in roster insertion order.
    pub fn ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.keys().copied()
    }

    /// Whether the store holds the given id.
    pub fn contains(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of members in the store.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Apply a partial update to one member.
    ///
    /// Only the fields present in the diff are replaced. The id is
    /// validated before anything is written, so an unknown id leaves the
    /// store untouched. A present `tier` goes through the standard
    /// assignment transition.
    pub fn upsert(&mut self, diff: MemberDiff) -> Result<(), TrueUpError> {
        let member = self.get_mut(diff.id)?;
        if let Some(name) = diff.name {
            member.name = name;
        }
        if let Some(tier) = diff.tier {
            let status = member.assign_tier(tier);
            debug!(id = %member.id, %tier, %status, "tier assigned via upsert");
        }
        if let Some(at) = diff.last_active_at {
            member.last_active_at = at;
        }
        if let Some(summary) = diff.last_activity_summary {
            member.last_activity_summary = summary;
        }
        Ok(())
    }
}
