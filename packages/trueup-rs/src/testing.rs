//! Testing utilities for reconciliation workflows.
//!
//! Canned collaborators for driving a [`TrueUpEngine`] without a real
//! identity provider, roster endpoint, or reconciliation service. Used by
//! this crate's own tests and exported for hosts behind the `testing`
//! feature:
//!
//! ```toml
//! [dev-dependencies]
//! trueup = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use trueup::testing::{sample_roster, FixedIdentity, ScriptedApi, StaticRoster};
//!
//! let api = Arc::new(ScriptedApi::new());        // confirms everything
//! api.reject(wade_id, "tier not permitted");     // ...except Wade
//!
//! let engine = TrueUpEngine::builder(
//!     Arc::new(FixedIdentity::new("ops@example.com")),
//!     Arc::new(StaticRoster::new(sample_roster())),
//!     api.clone(),
//! )
//! .start()
//! .await?;
//! ```
//!
//! # Holding a dispatch open
//!
//! The [`Gate`] latch parks the scripted service mid-call so a test can
//! observe the engine while a dispatch is in flight:
//!
//! ```ignore
//! let gate = api.gate();
//! let task = tokio::spawn({ let engine = engine.clone(); async move { engine.dispatch().await } });
//! gate.entered().await;                   // service has the batch now
//! assert!(engine.set_tier(id, tier).is_err());   // Conflict
//! gate.release();                         // let the service answer
//! task.await??;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::Notify;

use crate::dispatch::{Outcome, ReconciliationApi, SubmissionItem, SubmissionOutcome};
use crate::member::{Member, MemberId, SyncStatus, Tier};
use crate::roster::{AuthenticationRequired, IdentityProvider, RosterSource};

// =============================================================================
// Gate
// =============================================================================

/// Two-sided latch for holding a scripted service call open.
///
/// One side (the test) awaits [`Gate::entered`] to know the call arrived,
/// then calls [`Gate::release`] when it is done observing the in-flight
/// state. The other side (the scripted service) signals entry and parks
/// until released.
#[derive(Default)]
pub struct Gate {
    entered: AtomicBool,
    entered_notify: Notify,
    released: AtomicBool,
    released_notify: Notify,
}

impl Gate {
    /// Create a new gate.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until the service call has arrived and is parked.
    pub async fn entered(&self) {
        loop {
            // Register before checking; Notify is edge-triggered.
            let notified = self.entered_notify.notified();
            if self.entered.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Let the parked service call proceed to its answer.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.released_notify.notify_waiters();
    }

    pub(crate) fn enter(&self) {
        self.entered.store(true, Ordering::Release);
        self.entered_notify.notify_waiters();
    }

    pub(crate) async fn wait_release(&self) {
        loop {
            let notified = self.released_notify.notified();
            if self.released.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

// =============================================================================
// Scripted reconciliation service
// =============================================================================

#[derive(Default)]
struct Script {
    rejections: HashMap<MemberId, String>,
    submissions: Vec<Vec<SubmissionItem>>,
    gate: Option<Arc<Gate>>,
}

/// Programmable [`ReconciliationApi`].
///
/// Confirms every submitted member unless a rejection is scripted for its
/// id. Records every batch it receives; can fail wholesale to exercise
/// transport-error paths; can park mid-call on a [`Gate`].
#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
    fail_transport: AtomicBool,
}

impl ScriptedApi {
    /// A service that confirms everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a rejection for one member id.
    pub fn reject(&self, id: MemberId, reason: impl Into<String>) {
        self.lock().rejections.insert(id, reason.into());
    }

    /// Clear a scripted rejection so the member confirms again.
    pub fn confirm(&self, id: MemberId) {
        self.lock().rejections.remove(&id);
    }

    /// Make every subsequent call fail wholesale (transport error).
    pub fn fail_transport(&self) {
        self.fail_transport.store(true, Ordering::Release);
    }

    /// Restore normal per-member answers.
    pub fn restore_transport(&self) {
        self.fail_transport.store(false, Ordering::Release);
    }

    /// Install and return a [`Gate`]; subsequent calls park on it.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Gate::new();
        self.lock().gate = Some(gate.clone());
        gate
    }

    /// Every batch received so far, in call order.
    pub fn submissions(&self) -> Vec<Vec<SubmissionItem>> {
        self.lock().submissions.clone()
    }

    /// How many times the service was called.
    pub fn call_count(&self) -> usize {
        self.lock().submissions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl ReconciliationApi for ScriptedApi {
    async fn submit(&self, batch: Vec<SubmissionItem>) -> anyhow::Result<Vec<SubmissionOutcome>> {
        let gate = {
            let mut script = self.lock();
            script.submissions.push(batch.clone());
            script.gate.clone()
        };

        if let Some(gate) = gate {
            gate.enter();
            gate.wait_release().await;
        }

        if self.fail_transport.load(Ordering::Acquire) {
            anyhow::bail!("connection reset by peer");
        }

        let script = self.lock();
        Ok(batch
            .into_iter()
            .map(|item| SubmissionOutcome {
                id: item.id,
                outcome: match script.rejections.get(&item.id) {
                    Some(reason) => Outcome::Rejected {
                        reason: reason.clone(),
                    },
                    None => Outcome::Confirmed,
                },
            })
            .collect())
    }
}

/// A reconciliation service that panics on every call.
///
/// Exists to prove a misbehaving collaborator cannot wedge the engine.
pub struct PanickingApi;

#[async_trait::async_trait]
impl ReconciliationApi for PanickingApi {
    async fn submit(&self, _batch: Vec<SubmissionItem>) -> anyhow::Result<Vec<SubmissionOutcome>> {
        panic!("scripted panic in reconciliation service");
    }
}

// =============================================================================
// Canned session collaborators
// =============================================================================

/// An [`IdentityProvider`] that returns a fixed email, or demands sign-in.
pub struct FixedIdentity {
    email: Option<String>,
}

impl FixedIdentity {
    /// A signed-in operator.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }

    /// A session with nobody signed in.
    pub fn signed_out() -> Self {
        Self { email: None }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FixedIdentity {
    async fn operator_email(&self) -> anyhow::Result<String> {
        match &self.email {
            Some(email) => Ok(email.clone()),
            None => Err(AuthenticationRequired.into()),
        }
    }
}

/// A [`RosterSource`] serving a fixed member list.
pub struct StaticRoster {
    members: Vec<Member>,
}

impl StaticRoster {
    /// Serve exactly these members, in this order.
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }
}

#[async_trait::async_trait]
impl RosterSource for StaticRoster {
    async fn load(&self) -> anyhow::Result<Vec<Member>> {
        Ok(self.members.clone())
    }
}

/// A [`RosterSource`] that always demands sign-in.
pub struct AuthWall;

#[async_trait::async_trait]
impl RosterSource for AuthWall {
    async fn load(&self) -> anyhow::Result<Vec<Member>> {
        Err(AuthenticationRequired.into())
    }
}

// =============================================================================
// Fixture roster
// =============================================================================

/// The five-member fixture roster used across the test suite.
///
/// Mirrors the system of record's seed data: one settled paid member, two
/// provisional members in different stages of review, one guest flagged
/// for access removal, and one viewer.
pub fn sample_roster() -> Vec<Member> {
    let now = Utc::now();
    let seed = [
        (
            "Jane Cooper",
            Tier::PaidMember,
            SyncStatus::InSync,
            2,
            "3 uploaded docs, 2 shared workspaces",
            (2023, 1, 15),
        ),
        (
            "Wade Warren",
            Tier::ProvisionalMember,
            SyncStatus::PendingUpgrade,
            5,
            "1 draft proposal, no recent uploads",
            (2025, 1, 1),
        ),
        (
            "Robert Fox",
            Tier::Guest,
            SyncStatus::RemoveAccessRequested,
            10,
            "Viewed internal dashboard",
            (2022, 12, 20),
        ),
        (
            "Theresa Webb",
            Tier::Viewer,
            SyncStatus::InSync,
            1,
            "2 asset downloads, 1 feedback log",
            (2023, 5, 5),
        ),
        (
            "Devon Lane",
            Tier::ProvisionalMember,
            SyncStatus::ReviewNeeded,
            8,
            "No activity in 7 days",
            (2025, 1, 10),
        ),
    ];

    seed.into_iter()
        .map(|(name, tier, status, days_ago, summary, (y, m, d))| {
            Member::from_roster(
                MemberId::new(),
                name,
                tier,
                status,
                now - Duration::days(days_ago),
                summary,
                NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            )
        })
        .collect()
}
