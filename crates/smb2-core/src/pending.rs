//! Per-connection set of in-flight requests.
//!
//! The set is keyed by message id and remembers submission order, so lookup
//! on dispatch is a map probe while a connection-wide failure sweeps the
//! requests oldest first.
//!
//! The one thing the owner must react to is the set changing between empty
//! and non-empty: the connection keeps exactly one frame read outstanding
//! while anything is pending. `insert` and `remove` report that edge as a
//! [`Transition`] so the owner never re-derives it at call sites.

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::message_id::MessageId;

/// Edge reported by a pending-set mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The set went from empty to one entry: start the frame read.
    FirstPending,

    /// The set went from one entry to empty: release the frame read.
    LastRemoved,

    /// Size changed without crossing the empty boundary.
    Unchanged,
}

/// Ordered map from message id to the completion slot of a pending request.
#[derive(Debug)]
pub struct PendingSet<T> {
    entries: IndexMap<MessageId, T>,
}

impl<T> Default for PendingSet<T> {
    fn default() -> Self {
        PendingSet {
            entries: IndexMap::new(),
        }
    }
}

impl<T> PendingSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `slot` under `id`.
    ///
    /// Ids are unique among pending entries; a duplicate is rejected and the
    /// set is left untouched.
    pub fn insert(&mut self, id: MessageId, slot: T) -> Result<Transition, CoreError> {
        if self.entries.contains_key(&id) {
            return Err(CoreError::DuplicateMessageId(id));
        }
        self.entries.insert(id, slot);
        if self.entries.len() == 1 {
            Ok(Transition::FirstPending)
        } else {
            Ok(Transition::Unchanged)
        }
    }

    /// Remove the entry for `id`.
    ///
    /// Returns `None` when the id is not pending (already resolved or
    /// cancelled); that is a no-op for the set.
    pub fn remove(&mut self, id: MessageId) -> Option<(T, Transition)> {
        let slot = self.entries.shift_remove(&id)?;
        let transition = if self.entries.is_empty() {
            Transition::LastRemoved
        } else {
            Transition::Unchanged
        };
        Some((slot, transition))
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending ids in submission order.
    pub fn ids(&self) -> Vec<MessageId> {
        self.entries.keys().copied().collect()
    }

    /// Take every entry out, oldest first, leaving the set empty.
    ///
    /// Used for connection-wide failure: the caller resolves the drained
    /// slots after the set is already consistent, so nothing it does while
    /// resolving can disturb the sweep.
    pub fn drain(&mut self) -> Vec<(MessageId, T)> {
        self.entries.drain(..).collect()
    }
}
