//! The True-Up engine: one session's roster, selection, and dispatch state
//! behind a single handle.
//!
//! # Concurrency model
//!
//! Single logical writer. Every mutation is a discrete operator action, and
//! all roster state (store, selection, in-flight batch) lives behind one
//! lock. The only suspending operation is the dispatch round trip, and the
//! lock is never held across that await:
//!
//! 1. One critical section snapshots the pending batch and marks its ids
//!    in flight.
//! 2. The reconciliation call runs unlocked, bounded by the configured
//!    timeout and isolated from collaborator panics.
//! 3. A second critical section settles the outcomes member by member and
//!    clears the in-flight mark.
//!
//! While a dispatch is outstanding, edits to members in the batch are
//! refused with `Conflict` - otherwise a stale `Confirmed` keyed to the old
//! tier would silently overwrite the new edit. Edits to everyone else land
//! immediately and ride the next batch. A second dispatch is refused with
//! `DispatchInProgress`; batches are never merged.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dispatch::{DispatchReport, Outcome, ReconciliationApi, SubmissionItem};
use crate::error::TrueUpError;
use crate::member::{Member, MemberDiff, MemberId, SyncStatus, Tier};
use crate::query::RosterQuery;
use crate::roster::{
    AuthenticationRequired, IdentityProvider, OperatorSession, RosterSource,
};
use crate::selection::Selection;
use crate::stats::RosterStats;
use crate::store::MemberStore;

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`TrueUpEngine`].
///
/// # Example
///
/// ```ignore
/// use trueup::{TrueUpEngine, EngineConfig};
///
/// let engine = TrueUpEngine::builder(identity, roster_source, api)
///     .with_config(EngineConfig::from_env()?)
///     .start()
///     .await?;
///
/// println!("reviewing as {}", engine.operator().email);
/// ```
pub struct TrueUpBuilder {
    identity: Arc<dyn IdentityProvider>,
    roster: Arc<dyn RosterSource>,
    api: Arc<dyn ReconciliationApi>,
    config: EngineConfig,
}

impl TrueUpBuilder {
    /// Start building an engine from its three collaborators.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        roster: Arc<dyn RosterSource>,
        api: Arc<dyn ReconciliationApi>,
    ) -> Self {
        Self {
            identity,
            roster,
            api,
            config: EngineConfig::default(),
        }
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the operator, load the roster, and hand back a live engine.
    ///
    /// Fails with `AuthenticationRequired` when either session collaborator
    /// demands sign-in, `RosterUnavailable` when the roster cannot be
    /// loaded, and `DuplicateId` when the roster repeats a member id.
    pub async fn start(self) -> Result<TrueUpEngine, TrueUpError> {
        let email = self
            .identity
            .operator_email()
            .await
            .map_err(|_| TrueUpError::AuthenticationRequired)?;

        let members = self.roster.load().await.map_err(|err| {
            if err.downcast_ref::<AuthenticationRequired>().is_some() {
                TrueUpError::AuthenticationRequired
            } else {
                TrueUpError::RosterUnavailable {
                    message: err.to_string(),
                }
            }
        })?;

        let store = MemberStore::from_roster(members)?;
        let operator = OperatorSession::begin(email);
        info!(
            operator = %operator.email,
            members = store.len(),
            "true-up session started"
        );

        Ok(TrueUpEngine {
            inner: Arc::new(EngineInner {
                roster: Mutex::new(RosterState {
                    store,
                    selection: Selection::new(),
                    inflight: None,
                }),
                api: self.api,
                config: self.config,
                operator,
            }),
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

struct RosterState {
    store: MemberStore,
    selection: Selection,
    /// Ids of the batch currently awaiting the reconciliation service,
    /// `None` when no dispatch is outstanding.
    inflight: Option<HashSet<MemberId>>,
}

struct EngineInner {
    roster: Mutex<RosterState>,
    api: Arc<dyn ReconciliationApi>,
    config: EngineConfig,
    operator: OperatorSession,
}

/// Handle to one reconciliation session.
///
/// Cheap to clone; all clones share the same roster state.
#[derive(Clone)]
pub struct TrueUpEngine {
    inner: Arc<EngineInner>,
}

impl TrueUpEngine {
    /// Start building an engine from its collaborators.
    pub fn builder(
        identity: Arc<dyn IdentityProvider>,
        roster: Arc<dyn RosterSource>,
        api: Arc<dyn ReconciliationApi>,
    ) -> TrueUpBuilder {
        TrueUpBuilder::new(identity, roster, api)
    }

    /// The operator context captured at session start.
    pub fn operator(&self) -> &OperatorSession {
        &self.inner.operator
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn roster(&self) -> MutexGuard<'_, RosterState> {
        match self.inner.roster.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("roster lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    // =========================================================================
    // View projection
    // =========================================================================

    /// Look up one member by id.
    pub fn get(&self, id: MemberId) -> Result<Member, TrueUpError> {
        self.roster().store.get(id).cloned()
    }

    /// The full roster, in insertion order.
    pub fn list(&self) -> Vec<Member> {
        self.roster().store.members()
    }

    /// The members visible under a query, in roster order.
    ///
    /// Recomputed in full on every call; nothing is cached between
    /// queries.
    pub fn visible(&self, query: &RosterQuery) -> Vec<Member> {
        let roster = self.roster();
        crate::query::visible(&roster.store, query).cloned().collect()
    }

    /// Headline stats for the current roster.
    pub fn stats(&self) -> RosterStats {
        let roster = self.roster();
        RosterStats::collect(
            roster.store.list(),
            chrono::Utc::now(),
            self.inner.config.engagement_window_days,
        )
    }

    // =========================================================================
    // Tier assignment
    // =========================================================================

    /// Assign a tier to one member.
    ///
    /// The status flips locally at once (`PendingSync`, or `InSync` on a
    /// revert) so the operator sees the dirty row before any round trip.
    /// Fails with `NotFound` for an unknown id and `Conflict` while the
    /// member's sync result is in flight.
    pub fn set_tier(&self, id: MemberId, new_tier: Tier) -> Result<SyncStatus, TrueUpError> {
        let mut roster = self.roster();
        if !roster.store.contains(id) {
            return Err(TrueUpError::NotFound { id });
        }
        if roster.is_inflight(id) {
            return Err(TrueUpError::Conflict { id });
        }
        let member = roster.store.get_mut(id)?;
        let status = member.assign_tier(new_tier);
        debug!(%id, tier = %new_tier, %status, "tier assigned");
        Ok(status)
    }

    /// Assign a tier to many members as one logical operation.
    ///
    /// All-or-nothing: every id is validated against the store and the
    /// in-flight batch before anything is mutated, so one unknown id fails
    /// the whole call with `NotFound` and zero edits applied. Duplicate
    /// ids are applied once. On success the selection is cleared so a
    /// stale selection cannot be re-applied by accident.
    ///
    /// Returns how many members were assigned.
    pub fn set_tier_bulk(
        &self,
        ids: &[MemberId],
        new_tier: Tier,
    ) -> Result<usize, TrueUpError> {
        let mut roster = self.roster();

        // Validate the whole batch before touching anyone.
        for &id in ids {
            if !roster.store.contains(id) {
                return Err(TrueUpError::NotFound { id });
            }
            if roster.is_inflight(id) {
                return Err(TrueUpError::Conflict { id });
            }
        }

        let unique: Vec<MemberId> = {
            let mut seen = HashSet::new();
            ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        };
        for &id in &unique {
            let member = roster.store.get_mut(id)?;
            let status = member.assign_tier(new_tier);
            debug!(%id, tier = %new_tier, %status, "tier assigned (bulk)");
        }
        roster.selection.clear();
        Ok(unique.len())
    }

    /// Bulk-assign a tier to the current selection.
    pub fn apply_to_selection(&self, new_tier: Tier) -> Result<usize, TrueUpError> {
        let selected = self.roster().selection.selected();
        self.set_tier_bulk(&selected, new_tier)
    }

    /// Re-queue a failed edit without changing the attempted tier.
    ///
    /// A no-op (returning the current status) unless the member is
    /// `SyncFailed`.
    pub fn retry(&self, id: MemberId) -> Result<SyncStatus, TrueUpError> {
        let mut roster = self.roster();
        if !roster.store.contains(id) {
            return Err(TrueUpError::NotFound { id });
        }
        if roster.is_inflight(id) {
            return Err(TrueUpError::Conflict { id });
        }
        let member = roster.store.get_mut(id)?;
        let status = member.retry_sync();
        debug!(%id, %status, "retry requested");
        Ok(status)
    }

    /// Apply a partial update to one member.
    ///
    /// Informational fields land unconditionally; a diff that carries a
    /// tier is subject to the same in-flight guard as [`set_tier`].
    ///
    /// [`set_tier`]: TrueUpEngine::set_tier
    pub fn update_details(&self, diff: MemberDiff) -> Result<(), TrueUpError> {
        let mut roster = self.roster();
        if !roster.store.contains(diff.id) {
            return Err(TrueUpError::NotFound { id: diff.id });
        }
        if diff.touches_tier() && roster.is_inflight(diff.id) {
            return Err(TrueUpError::Conflict { id: diff.id });
        }
        roster.store.upsert(diff)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Flip a member in or out of the bulk-edit selection.
    ///
    /// Returns whether the id is selected afterwards. The selection is not
    /// validated against the store here; a stale id surfaces as `NotFound`
    /// at bulk-apply time.
    pub fn toggle_selected(&self, id: MemberId) -> bool {
        self.roster().selection.toggle(id)
    }

    /// Empty the bulk-edit selection.
    pub fn clear_selection(&self) {
        self.roster().selection.clear();
    }

    /// The ids currently selected for bulk edit, in selection order.
    pub fn selected(&self) -> Vec<MemberId> {
        self.roster().selection.selected()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Push every pending tier change to the reconciliation service and
    /// settle the outcome member by member.
    ///
    /// An empty pending set resolves immediately with the default report
    /// and no service call. A transport failure (unreachable, timeout, or
    /// a panicking collaborator) changes no member state: the whole batch
    /// stays pending and goes out in full on the next dispatch.
    pub async fn dispatch(&self) -> Result<DispatchReport, TrueUpError> {
        let batch = {
            let mut roster = self.roster();
            if roster.inflight.is_some() {
                return Err(TrueUpError::DispatchInProgress);
            }
            let batch: Vec<SubmissionItem> = roster
                .store
                .list()
                .filter(|m| m.sync_status.is_pending())
                .map(|m| SubmissionItem {
                    id: m.id,
                    requested_tier: m.tier,
                })
                .collect();
            if batch.is_empty() {
                debug!("nothing pending, dispatch is a no-op");
                return Ok(DispatchReport::default());
            }
            roster.inflight = Some(batch.iter().map(|item| item.id).collect());
            batch
        };

        let submitted = batch.len();
        info!(submitted, "dispatching pending tier changes");

        // The collaborator runs unlocked, bounded by the timeout, and
        // isolated so a panic inside it cannot wedge the session.
        let call = AssertUnwindSafe(self.inner.api.submit(batch)).catch_unwind();
        let timeout = self.inner.config.dispatch_timeout;
        let outcomes = match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                return Err(self.abort_dispatch(format!("timed out after {timeout:?}")));
            }
            Ok(Err(_panic)) => {
                return Err(self.abort_dispatch("reconciliation service panicked".to_string()));
            }
            Ok(Ok(Err(err))) => {
                return Err(self.abort_dispatch(err.to_string()));
            }
            Ok(Ok(Ok(outcomes))) => outcomes,
        };

        let mut roster = self.roster();
        let inflight = roster.inflight.take().unwrap_or_default();

        let mut report = DispatchReport {
            submitted,
            ..DispatchReport::default()
        };
        let mut answered: HashSet<MemberId> = HashSet::new();
        for answer in outcomes {
            if !inflight.contains(&answer.id) {
                warn!(id = %answer.id, "outcome for a member outside the batch, ignoring");
                continue;
            }
            if !answered.insert(answer.id) {
                warn!(id = %answer.id, "duplicate outcome for member, keeping the first");
                continue;
            }
            let member = match roster.store.get_mut(answer.id) {
                Ok(member) => member,
                Err(_) => {
                    // Members are never removed, so this cannot happen; if
                    // it somehow does, settle the rest of the batch anyway.
                    warn!(id = %answer.id, "batch member missing from store at settlement");
                    continue;
                }
            };
            match answer.outcome {
                Outcome::Confirmed => {
                    member.confirm_sync();
                    report.synced += 1;
                }
                Outcome::Rejected { reason } => {
                    debug!(id = %answer.id, %reason, "tier change rejected");
                    member.reject_sync(reason);
                    report.failed += 1;
                }
            }
        }

        report.unresolved = submitted - report.synced - report.failed;
        if report.unresolved > 0 {
            warn!(
                unresolved = report.unresolved,
                "service left batch members unanswered; they remain pending"
            );
        }
        info!(%report, "dispatch settled");
        Ok(report)
    }

    /// Clear the in-flight mark after a transport-level failure.
    ///
    /// No member was touched; the batch stays pending in full.
    fn abort_dispatch(&self, message: String) -> TrueUpError {
        let mut roster = self.roster();
        roster.inflight = None;
        warn!(%message, "dispatch abandoned, batch remains pending");
        TrueUpError::DispatchTransport { message }
    }
}

impl RosterState {
    fn is_inflight(&self, id: MemberId) -> bool {
        self.inflight
            .as_ref()
            .map(|ids| ids.contains(&id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for TrueUpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roster = self.roster();
        f.debug_struct("TrueUpEngine")
            .field("operator", &self.inner.operator.email)
            .field("members", &roster.store.len())
            .field("selected", &roster.selection.len())
            .field("dispatch_inflight", &roster.inflight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Tier;
    use crate::testing::{sample_roster, FixedIdentity, ScriptedApi, StaticRoster};

    async fn engine_with(api: Arc<ScriptedApi>) -> TrueUpEngine {
        TrueUpEngine::builder(
            Arc::new(FixedIdentity::new("ops@alignsync.example")),
            Arc::new(StaticRoster::new(sample_roster())),
            api,
        )
        .start()
        .await
        .unwrap()
    }

    fn id_of(engine: &TrueUpEngine, name: &str) -> MemberId {
        engine
            .list()
            .into_iter()
            .find(|m| m.name == name)
            .map(|m| m.id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_builder_captures_operator() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        assert_eq!(engine.operator().email, "ops@alignsync.example");
        assert_eq!(engine.list().len(), 5);
    }

    #[tokio::test]
    async fn test_set_tier_flips_status_locally() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let jane = id_of(&engine, "Jane Cooper");

        let status = engine.set_tier(jane, Tier::Viewer).unwrap();
        assert_eq!(status, SyncStatus::PendingSync);
        assert_eq!(engine.get(jane).unwrap().tier, Tier::Viewer);
    }

    #[tokio::test]
    async fn test_set_tier_unknown_id() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let err = engine.set_tier(MemberId::new(), Tier::Viewer).unwrap_err();
        assert!(matches!(err, TrueUpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_bulk_is_atomic_on_unknown_id() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let mut ids: Vec<MemberId> = engine.list().into_iter().map(|m| m.id).collect();
        let before: Vec<SyncStatus> = engine.list().into_iter().map(|m| m.sync_status).collect();

        ids.push(MemberId::new()); // one unknown among five valid
        let err = engine.set_tier_bulk(&ids, Tier::Guest).unwrap_err();
        assert!(matches!(err, TrueUpError::NotFound { .. }));

        let after: Vec<SyncStatus> = engine.list().into_iter().map(|m| m.sync_status).collect();
        assert_eq!(before, after, "no member may be mutated on a failed bulk");
    }

    #[tokio::test]
    async fn test_bulk_clears_selection_on_success() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let jane = id_of(&engine, "Jane Cooper");
        let wade = id_of(&engine, "Wade Warren");

        engine.toggle_selected(jane);
        engine.toggle_selected(wade);
        assert_eq!(engine.selected().len(), 2);

        let touched = engine.apply_to_selection(Tier::PaidMember).unwrap();
        assert_eq!(touched, 2);
        assert!(engine.selected().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_deduplicates_ids() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let jane = id_of(&engine, "Jane Cooper");
        let touched = engine
            .set_tier_bulk(&[jane, jane, jane], Tier::Guest)
            .unwrap();
        assert_eq!(touched, 1);
    }

    #[tokio::test]
    async fn test_failed_bulk_keeps_selection() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let jane = id_of(&engine, "Jane Cooper");
        engine.toggle_selected(jane);

        let err = engine
            .set_tier_bulk(&[jane, MemberId::new()], Tier::Guest)
            .unwrap_err();
        assert!(matches!(err, TrueUpError::NotFound { .. }));
        assert_eq!(engine.selected(), vec![jane]);
    }

    #[tokio::test]
    async fn test_update_details_patches_informational_fields() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let theresa = id_of(&engine, "Theresa Webb");

        engine
            .update_details(
                MemberDiff::for_member(theresa).last_activity_summary("3 feedback logs"),
            )
            .unwrap();
        let member = engine.get(theresa).unwrap();
        assert_eq!(member.last_activity_summary, "3 feedback logs");
        assert_eq!(member.sync_status, SyncStatus::InSync);
    }

    #[tokio::test]
    async fn test_visible_projection_through_engine() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let names: Vec<String> = engine
            .visible(&RosterQuery::search("devon"))
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["Devon Lane"]);
    }

    #[tokio::test]
    async fn test_stats_projection_through_engine() {
        let engine = engine_with(Arc::new(ScriptedApi::new())).await;
        let stats = engine.stats();
        assert_eq!(stats.total_members, 5);
        assert_eq!(stats.paid_members, 1);
        assert_eq!(stats.provisional_members, 2);
    }

    #[tokio::test]
    async fn test_builder_surfaces_authentication_required() {
        let result = TrueUpEngine::builder(
            Arc::new(FixedIdentity::signed_out()),
            Arc::new(StaticRoster::new(sample_roster())),
            Arc::new(ScriptedApi::new()),
        )
        .start()
        .await;
        assert!(matches!(result, Err(TrueUpError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn test_builder_rejects_duplicate_roster_ids() {
        let mut roster = sample_roster();
        let dup = roster[0].clone();
        roster.push(dup);

        let result = TrueUpEngine::builder(
            Arc::new(FixedIdentity::new("ops@alignsync.example")),
            Arc::new(StaticRoster::new(roster)),
            Arc::new(ScriptedApi::new()),
        )
        .start()
        .await;
        assert!(matches!(result, Err(TrueUpError::DuplicateId { .. })));
    }
}
