//! Selection set for bulk operations.
//!
//! Purely UI-scoped state: the set of member ids currently checked for a
//! bulk edit. The selection itself carries no invariant - ids are validated
//! against the store when the bulk edit is applied, not here - so a row
//! that was selected and then filtered out of view stays selected.

use indexmap::IndexSet;

use crate::member::MemberId;

/// The set of members checked for a bulk operation.
///
/// Iteration order is the order ids were selected, which keeps bulk-apply
/// and `selected()` deterministic.
#[derive(Debug, Default)]
pub struct Selection {
    ids: IndexSet<MemberId>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of an id in the selection.
    ///
    /// Returns whether the id is selected after the toggle.
    pub fn toggle(&mut self, id: MemberId) -> bool {
        if self.ids.shift_remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Empty the selection.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// The currently selected ids, in selection order.
    pub fn selected(&self) -> Vec<MemberId> {
        self.ids.iter().copied().collect()
    }

    /// Whether an id is currently selected.
    pub fn contains(&self, id: MemberId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of selected ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
