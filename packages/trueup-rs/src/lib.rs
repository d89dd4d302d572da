//! # TrueUp
//!
//! A member reconciliation engine: operators review a roster, correct tier
//! assignments against actual activity, and push the corrections to the
//! membership system of record in batches.
//!
//! ## Core Concepts
//!
//! TrueUp separates **assignment** from **confirmation**:
//! - `tier` = what the operator has assigned
//! - `sync_status` = whether the system of record has confirmed it
//!
//! The key principle: **a member is never `Synced` with an un-pushed
//! edit**. Local edits flip the member to `PendingSync` immediately; only
//! a dispatch confirmation for that member ever sets `Synced`.
//!
//! ## Architecture
//!
//! ```text
//! Host UI events
//!     │
//!     ├─► toggle_selected() ──► Selection
//!     │
//!     ├─► set_tier() / set_tier_bulk() ──► MemberStore (id-indexed)
//!     │                                        │
//!     │                     visible(query) ◄───┤ insertion-ordered view
//!     │                                        │
//!     └─► dispatch() ── pending batch ──► ReconciliationApi (host-supplied)
//!                            │                 │
//!                            │      Confirmed / Rejected(reason), per id
//!                            │                 │
//!                            └──── settle ◄────┘
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Id-indexed** - Every lookup and edit keys on [`MemberId`]; nothing
//!    is ever addressed by display name or row position
//! 2. **Stable ordering** - Views walk roster insertion order; edits never
//!    reorder rows under the operator
//! 3. **Synced means confirmed** - `Synced` is set only when a dispatch
//!    confirms that member
//! 4. **Failed edits survive** - A rejection keeps the attempted tier and
//!    the reason; nothing is silently dropped
//! 5. **One dispatch at a time** - Batches are never merged; members in
//!    flight refuse edits until their outcome settles
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trueup::{EngineConfig, RosterQuery, Tier, TrueUpEngine};
//!
//! // Host-supplied collaborators: who is signed in, the roster, and the
//! // reconciliation submission API.
//! let engine = TrueUpEngine::builder(identity, roster_source, api)
//!     .with_config(EngineConfig::from_env()?)
//!     .start()
//!     .await?;
//!
//! // Review, edit, and push.
//! for member in engine.visible(&RosterQuery::search("devon")) {
//!     engine.set_tier(member.id, Tier::Viewer)?;
//! }
//! let report = engine.dispatch().await?;
//! println!("{report}");
//! ```
//!
//! ## What This Is Not
//!
//! TrueUp is **not**:
//! - A persistence layer (the roster lives in memory for one session)
//! - A transport (hosts implement [`ReconciliationApi`] however they talk
//!   to their system of record)
//! - An auth system (identity arrives through [`IdentityProvider`], already
//!   resolved)
//! - A renderer (views are plain data; the dashboard decides what a row
//!   looks like)

// Core modules
mod config;
mod dispatch;
mod engine;
mod error;
mod member;
mod query;
mod roster;
mod selection;
mod stats;
mod store;

// Testing utilities (feature-gated; also used by this crate's own tests)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export the member model
pub use member::{Member, MemberDiff, MemberId, SyncStatus, Tier};

// Re-export the store and view projection
pub use query::{visible, RosterQuery, StatusFilter};
pub use store::MemberStore;

// Re-export selection
pub use selection::Selection;

// Re-export dispatch boundary types
pub use dispatch::{
    DispatchReport, Outcome, ReconciliationApi, SubmissionItem, SubmissionOutcome,
};

// Re-export session collaborators
pub use roster::{AuthenticationRequired, IdentityProvider, OperatorSession, RosterSource};

// Re-export engine types (primary entry point)
pub use engine::{TrueUpBuilder, TrueUpEngine};

// Re-export stats projection
pub use stats::RosterStats;

// Re-export configuration
pub use config::EngineConfig;

// Re-export error types
pub use error::TrueUpError;

// Re-export commonly used external types
pub use async_trait::async_trait;
