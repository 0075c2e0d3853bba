//! Range identifier allocation.
//!
//! Identifiers are small integers in `[1, max_id]`, recycled once a session
//! ends. The policy prefers the id right after the highest one in use, so ids
//! look increasing to operators, and falls back to the lowest free id once
//! that would overflow `max_id`.
//!
//! Invariants:
//! - an allocated id is never active, never pending and never `0`
//! - `allocate` is pure; reservation state lives in `PendingIds`
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

pub fn allocate(active: &BTreeSet<u32>, pending: &BTreeSet<u32>, max_id: u32) -> Option<u32> {
    let is_unavailable = |id: u32| id == 0 || active.contains(&id) || pending.contains(&id);

    let highest = active
        .last()
        .copied()
        .max(pending.last().copied())
        .unwrap_or(0);

    if let Some(next) = highest.checked_add(1) {
        if next <= max_id && !is_unavailable(next) {
            return Some(next);
        }
    }

    (1..=max_id).find(|&id| !is_unavailable(id))
}

/// Identifiers handed out but not yet committed to the registry.
///
/// Never persisted: a restart forgets every in-flight reservation.
#[derive(Clone, Default)]
pub struct PendingIds {
    inner: Arc<Mutex<BTreeSet<u32>>>,
}

impl PendingIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Allocates against `active` and marks the result pending in one
    /// critical section.
    ///
    /// Callers must hold whatever lock keeps `active` current until this
    /// returns.
    pub fn reserve(&self, active: &BTreeSet<u32>, max_id: u32) -> Option<Reservation> {
        let mut pending = self.inner.lock();
        let id = allocate(active, &pending, max_id)?;
        pending.insert(id);

        Some(Reservation {
            id,
            pending: self.clone(),
        })
    }
}

/// A pending identifier. Dropping it releases the id, on every exit path.
#[derive(Debug)]
pub struct Reservation {
    id: u32,
    pending: PendingIds,
}

impl Reservation {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn range_id(&self) -> String {
        self.id.to_string()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pending.inner.lock().remove(&self.id);
    }
}

impl std::fmt::Debug for PendingIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.inner.lock().iter()).finish()
    }
}
