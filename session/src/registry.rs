//! SessionRegistry
//!
//! Concurrency-guarded view over one registry file (active sessions, or saved
//! configurations). Each instance owns its own mutex.
//!
//! Invariants:
//! - every mutation is one `load -> mutate -> persist` cycle under the mutex
//! - nothing is persisted when a mutation matched no record
//! - allocation reads the registry and marks the id pending while the
//!   registry mutex is held, so two requests never receive the same id
//!
//! Non-responsibilities:
//! - talking to the content or instantiation services
//! - holding any lock across a service call
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::allocator::{PendingIds, Reservation};
use crate::model::{Session, SessionSection};
use crate::set::SessionSet;
use crate::store::SessionStore;
use crate::timing::warn_if_slow;

/// Slow-I/O threshold for one registry file read or write.
pub const DEFAULT_IO_BUDGET: Duration = Duration::from_millis(500);

pub struct SessionRegistry {
    label: &'static str,
    store: Arc<dyn SessionStore>,
    lock: Mutex<()>,
    io_budget: Duration,
}

impl SessionRegistry {
    pub fn new(label: &'static str, store: Arc<dyn SessionStore>) -> Self {
        Self {
            label,
            store,
            lock: Mutex::new(()),
            io_budget: DEFAULT_IO_BUDGET,
        }
    }

    pub fn with_io_budget(mut self, budget: Duration) -> Self {
        self.io_budget = budget;
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    async fn locked_load(&self) -> Result<(MutexGuard<'_, ()>, SessionSet)> {
        let guard = self.lock.lock().await;
        let sessions = warn_if_slow("registry_load", self.io_budget, self.store.load_all())
            .await
            .with_context(|| format!("failed to load {} registry", self.label))?;
        Ok((guard, SessionSet::new(sessions)))
    }

    async fn persist(&self, _guard: &MutexGuard<'_, ()>, set: &SessionSet) -> Result<()> {
        warn_if_slow("registry_persist", self.io_budget, self.store.save_all(set.as_slice()))
            .await
            .with_context(|| format!("failed to persist {} registry", self.label))
    }

    /// Runs `mutate` on a fresh snapshot and persists the result when it
    /// reports a change.
    async fn update<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut SessionSet) -> bool,
    {
        let (guard, mut set) = self.locked_load().await?;
        if !mutate(&mut set) {
            return Ok(false);
        }
        self.persist(&guard, &set).await?;
        Ok(true)
    }

    /// Consistent snapshot of every record.
    #[instrument(skip(self), target = "registry", fields(registry = self.label))]
    pub async fn load(&self) -> Result<SessionSet> {
        let (_guard, set) = self.locked_load().await?;
        debug!(count = set.len(), "registry loaded");
        Ok(set)
    }

    #[instrument(
        skip(self, session),
        target = "registry",
        fields(registry = self.label, range_id = %session.id, user = %session.user)
    )]
    pub async fn add(&self, session: Session) -> Result<()> {
        self.update(|set| {
            set.add(session);
            true
        })
        .await?;

        info!("session record committed");
        Ok(())
    }

    #[instrument(skip(self), target = "registry", fields(registry = self.label))]
    pub async fn remove_simple(&self, id: &str, user: &str) -> Result<bool> {
        let removed = self.update(|set| set.remove_simple(id, user)).await?;
        if !removed {
            warn!("no session record matched removal");
        }
        Ok(removed)
    }

    #[instrument(skip(self), target = "registry", fields(registry = self.label))]
    pub async fn remove_variant(&self, id: &str, user: &str, activity_id: &str) -> Result<bool> {
        let removed = self
            .update(|set| set.remove_variant(id, user, activity_id))
            .await?;
        if !removed {
            warn!("no variant record matched removal");
        }
        Ok(removed)
    }

    /// Removes every listed variant in one cycle. Persists nothing unless
    /// all of them matched.
    #[instrument(skip(self), target = "registry", fields(registry = self.label))]
    pub async fn remove_variants(
        &self,
        id: &str,
        user: &str,
        activity_ids: &[String],
    ) -> Result<bool> {
        let removed = self
            .update(|set| {
                activity_ids
                    .iter()
                    .all(|activity| set.remove_variant(id, user, activity))
            })
            .await?;
        if !removed {
            warn!(expected = activity_ids.len(), "variant set no longer matches registry");
        }
        Ok(removed)
    }

    pub async fn active_ids(&self) -> Result<BTreeSet<u32>> {
        Ok(self.load().await?.active_ids_as_integers())
    }

    pub async fn has_session(&self, id: &str) -> Result<bool> {
        Ok(self.load().await?.has_session(id))
    }

    pub async fn has_session_for(&self, id: &str, user: &str) -> Result<bool> {
        Ok(self.load().await?.has_session_for(id, user))
    }

    pub async fn activity_id_for(&self, id: &str, user: &str) -> Result<Option<String>> {
        Ok(self
            .load()
            .await?
            .activity_id_for(id, user)
            .map(str::to_string))
    }

    pub async fn activity_ids_for(&self, id: &str, user: &str) -> Result<Vec<String>> {
        Ok(self.load().await?.activity_ids_for(id, user))
    }

    pub async fn sessions_for(&self, user: &str) -> Result<Vec<Session>> {
        Ok(self.load().await?.sessions_for(user))
    }

    pub async fn document_for(&self, user: &str) -> Result<Vec<SessionSection>> {
        Ok(self.load().await?.document_for(user))
    }

    /// Allocates a fresh range id and marks it pending.
    ///
    /// Both the registry mutex and the pending-set lock are held while the id
    /// is chosen; both are released before this returns.
    #[instrument(skip(self, pending), target = "registry", fields(registry = self.label))]
    pub async fn reserve_id(&self, pending: &PendingIds, max_id: u32) -> Result<Option<Reservation>> {
        let (_guard, set) = self.locked_load().await?;
        let active = set.active_ids_as_integers();

        let reservation = pending.reserve(&active, max_id);
        match &reservation {
            Some(r) => info!(range_id = r.id(), "allocated range id"),
            None => warn!(active = active.len(), max_id, "no range id available"),
        }
        Ok(reservation)
    }
}
