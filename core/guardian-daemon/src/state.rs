//! State owned by the daemon.
//!
//! One `SessionStore` and one overlay outbox behind a single `Mutex`. Every
//! request takes the lock for its whole operation, so store mutations apply
//! one at a time in arrival order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use focus_guardian_protocol::{OverlayCommand, SessionStatus, StartSessionPayload, TabEventPayload};
use guardian_core::{
    on_tab_activated, on_tab_updated, EndedSession, FileSessionPersistence, FileStatusIndicator,
    SessionPersistence, SessionStore, StatusIndicator, StorageConfig, Verdict,
};

use crate::outbox::OverlayOutbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabSignal {
    Updated,
    Activated,
}

struct Inner<P, I> {
    store: SessionStore<P, I>,
    outbox: OverlayOutbox,
}

pub struct SharedState<P = FileSessionPersistence, I = FileStatusIndicator> {
    inner: Mutex<Inner<P, I>>,
}

impl SharedState {
    /// Builds the file-backed state and restores any session left over from a
    /// previous process.
    pub fn from_storage(storage: &StorageConfig) -> Self {
        let store = SessionStore::new(
            FileSessionPersistence::new(storage.session_file()),
            FileStatusIndicator::new(storage.badge_file()),
        );
        Self::with_store(store)
    }
}

impl<P: SessionPersistence, I: StatusIndicator> SharedState<P, I> {
    pub fn with_store(mut store: SessionStore<P, I>) -> Self {
        if store.restore() {
            tracing::info!(task_id = ?store.active_task_id(), "Resumed flow session after restart");
        }
        Self {
            inner: Mutex::new(Inner {
                store,
                outbox: OverlayOutbox::new(),
            }),
        }
    }

    pub fn start_session(&self, payload: &StartSessionPayload) {
        let mut inner = self.lock();
        inner.store.start(&payload.task_id, &payload.allowed_sites);
    }

    pub fn end_session(&self) -> Option<EndedSession> {
        self.lock().store.end()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().store.status()
    }

    pub fn is_active(&self) -> bool {
        self.lock().store.is_active()
    }

    pub fn tab_event(&self, signal: TabSignal, event: &TabEventPayload) -> Verdict {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let url = event.url.as_deref();
        match signal {
            TabSignal::Updated => on_tab_updated(&mut inner.store, &mut inner.outbox, event.tab_id, url),
            TabSignal::Activated => {
                on_tab_activated(&mut inner.store, &mut inner.outbox, event.tab_id, url)
            }
        }
    }

    pub fn tab_removed(&self, tab_id: u32) {
        self.lock().outbox.discard(tab_id);
    }

    /// Hands out the tab's pending overlay, re-checking that the session that
    /// asked for it is still the active one. Stale commands are dropped.
    pub fn take_overlay(&self, tab_id: u32) -> Option<OverlayCommand> {
        let mut inner = self.lock();
        let command = inner.outbox.take(tab_id)?;
        match inner.store.active_task_id() {
            Some(task_id) if task_id == command.task_id => Some(command),
            active => {
                tracing::debug!(
                    tab_id,
                    queued_task_id = %command.task_id,
                    active_task_id = ?active,
                    "Dropping stale overlay command"
                );
                None
            }
        }
    }

    pub fn pending_overlays(&self) -> usize {
        self.lock().outbox.pending_count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<P, I>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
