//! Snapshot Store
//!
//! Holds the published generation behind an [`ArcSwap`] so readers never
//! block and never see a half-built generation. The Idle/Updating flag is
//! a single [`AtomicBool`]; winning the compare-and-swap yields an
//! [`UpdateGuard`], the only handle that can write to the store. Dropping
//! the guard returns the store to Idle on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;

use crate::domain::snapshot::{Snapshot, SnapshotView, UpdateState};

/// Process-wide snapshot holder.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    updating: AtomicBool,
}

impl SnapshotStore {
    /// Create an empty store in the Idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            updating: AtomicBool::new(false),
        }
    }

    /// Current generation.
    #[must_use]
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Current generation with the live update state.
    ///
    /// The snapshot and the flag are two separate loads, not one atomic
    /// read. A caller racing a publish may pair the new generation with
    /// `Updating`, or the old one with `Idle`. Each half is consistent on
    /// its own.
    #[must_use]
    pub fn view(&self) -> SnapshotView {
        SnapshotView {
            snapshot: self.load(),
            update_state: self.update_state(),
        }
    }

    /// Idle or Updating.
    #[must_use]
    pub fn update_state(&self) -> UpdateState {
        if self.updating.load(Ordering::Acquire) {
            UpdateState::Updating
        } else {
            UpdateState::Idle
        }
    }

    /// Whether nothing has been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Move Idle to Updating. Returns `None` if a refresh already holds the
    /// guard.
    #[must_use]
    pub fn try_begin(self: &Arc<Self>) -> Option<UpdateGuard> {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateGuard {
                store: Arc::clone(self),
            })
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive write access to a [`SnapshotStore`].
#[derive(Debug)]
pub struct UpdateGuard {
    store: Arc<SnapshotStore>,
}

impl UpdateGuard {
    /// Generation currently published.
    #[must_use]
    pub fn previous(&self) -> Arc<Snapshot> {
        self.store.load()
    }

    /// Publish `snapshot` as the next generation. Returns its number.
    pub fn publish(&self, mut snapshot: Snapshot) -> u64 {
        snapshot.generation = self.store.current.load().generation + 1;
        let generation = snapshot.generation;
        self.store.current.store(Arc::new(snapshot));
        generation
    }

    /// Keep the previous generation and record `error` on it.
    pub fn record_error(&self, error: impl Into<String>) {
        let failed = self.store.current.load().with_error(error);
        self.store.current.store(Arc::new(failed));
    }
}

impl Drop for UpdateGuard {
    fn drop(&mut self) {
        self.store.updating.store(false, Ordering::Release);
    }
}
