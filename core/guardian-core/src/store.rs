//! The Session Store: owner of the one focus session.
//!
//! ## State Machine
//!
//! ```text
//! Idle   --start-->   Active
//! Active --start-->   Active   (replaces the session, distractions discarded)
//! Active --end-->     Idle
//! Idle   --end-->     Idle     (no-op)
//! Idle   --restore--> Active   (when a persisted record exists)
//! ```
//!
//! Memory is updated before persistence is attempted, so `status` always
//! reflects the latest logical state. Persistence and badge failures are
//! logged and never returned; callers have nothing to recover.

use chrono::{DateTime, Duration, Utc};
use focus_guardian_protocol::{now_millis, Distraction, Session, SessionStatus};

use crate::indicator::{Badge, StatusIndicator};
use crate::matcher::AllowList;
use crate::persistence::SessionPersistence;

/// What `end` logs about a finished session. Not persisted anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    pub task_id: String,
    pub duration: Duration,
    pub ended_at: DateTime<Utc>,
    pub distraction_count: usize,
}

pub struct SessionStore<P, I> {
    current: Option<Session>,
    persistence: P,
    indicator: I,
}

impl<P: SessionPersistence, I: StatusIndicator> SessionStore<P, I> {
    /// Creates an idle store. Call [`SessionStore::restore`] once at process
    /// start to pick up a session that outlived the previous process.
    pub fn new(persistence: P, indicator: I) -> Self {
        Self {
            current: None,
            persistence,
            indicator,
        }
    }

    /// Starts a session, silently replacing any active one (last writer wins).
    /// The allow-list is stored as given, minus exact duplicates.
    pub fn start(&mut self, task_id: &str, allowed_sites: &[String]) -> &Session {
        if let Some(previous) = self.current.as_ref() {
            // Replacement drops the previous distraction history. Kept for
            // compatibility with existing clients; logged so it is visible.
            tracing::info!(
                previous_task_id = %previous.task_id,
                discarded_distractions = previous.distractions.len(),
                task_id = %task_id,
                "Replacing active flow session"
            );
        }

        let session = Session {
            task_id: task_id.to_string(),
            start_time: now_millis(),
            allowed_sites: AllowList::new(allowed_sites).into_vec(),
            distractions: Vec::new(),
        };
        tracing::info!(
            task_id = %session.task_id,
            allowed_sites = ?session.allowed_sites,
            "Flow session started"
        );

        let current = self.current.insert(session);
        if let Err(err) = self.persistence.save(current) {
            tracing::warn!(error = %err, "Failed to persist flow session");
        }
        if let Err(err) = self.indicator.show(&Badge::ACTIVE) {
            tracing::warn!(error = %err, "Failed to show session badge");
        }
        current
    }

    /// Ends the active session. Returns `None` (and does nothing) when idle.
    pub fn end(&mut self) -> Option<EndedSession> {
        let session = self.current.take()?;
        let ended_at = now_millis();
        let ended = EndedSession {
            task_id: session.task_id,
            duration: ended_at.signed_duration_since(session.start_time),
            ended_at,
            distraction_count: session.distractions.len(),
        };

        tracing::info!(
            task_id = %ended.task_id,
            duration_ms = ended.duration.num_milliseconds(),
            end_time = %ended.ended_at.to_rfc3339(),
            distractions = ended.distraction_count,
            "Flow session ended"
        );

        if let Err(err) = self.persistence.clear() {
            tracing::warn!(error = %err, "Failed to clear persisted session");
        }
        if let Err(err) = self.indicator.clear() {
            tracing::warn!(error = %err, "Failed to clear session badge");
        }
        Some(ended)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            is_active: self.current.is_some(),
            session: self.current.clone(),
        }
    }

    /// Reloads a persisted session after a restart. Returns whether the store
    /// became active. Only meaningful while idle.
    pub fn restore(&mut self) -> bool {
        if self.current.is_some() {
            tracing::debug!("Skipping restore; a session is already active");
            return false;
        }

        match self.persistence.load() {
            Ok(Some(session)) => {
                tracing::info!(
                    task_id = %session.task_id,
                    distractions = session.distractions.len(),
                    "Restored flow session"
                );
                self.current = Some(session);
                if let Err(err) = self.indicator.show(&Badge::ACTIVE) {
                    tracing::warn!(error = %err, "Failed to show session badge");
                }
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load persisted session; staying idle");
                false
            }
        }
    }

    /// Appends a distraction and re-persists. Ignored while idle.
    pub fn record_distraction(&mut self, site: &str, url: &str) -> bool {
        let Some(session) = self.current.as_mut() else {
            return false;
        };

        let distraction = Distraction {
            site: site.to_string(),
            timestamp: now_millis(),
            url: url.to_string(),
        };
        tracing::info!(site = %distraction.site, url = %distraction.url, "Distraction detected");
        session.distractions.push(distraction);

        let snapshot = session.clone();
        self.persist(&snapshot);
        true
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn active_task_id(&self) -> Option<&str> {
        self.current.as_ref().map(|session| session.task_id.as_str())
    }

    /// The active allow-list; empty while idle.
    pub fn allowed_sites(&self) -> &[String] {
        self.current
            .as_ref()
            .map(|session| session.allowed_sites.as_slice())
            .unwrap_or(&[])
    }

    fn persist(&self, session: &Session) {
        if let Err(err) = self.persistence.save(session) {
            tracing::warn!(error = %err, "Failed to persist flow session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::MemoryStatusIndicator;
    use crate::persistence::MemorySessionPersistence;

    type TestStore = SessionStore<MemorySessionPersistence, MemoryStatusIndicator>;

    fn sites(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    fn store() -> (TestStore, MemorySessionPersistence, MemoryStatusIndicator) {
        let persistence = MemorySessionPersistence::new();
        let indicator = MemoryStatusIndicator::new();
        (
            SessionStore::new(persistence.clone(), indicator.clone()),
            persistence,
            indicator,
        )
    }

    #[test]
    fn new_store_is_idle() {
        let (store, _, _) = store();
        assert_eq!(store.status(), SessionStatus::idle());
        assert!(store.allowed_sites().is_empty());
        assert_eq!(store.active_task_id(), None);
    }

    #[test]
    fn start_activates_persists_and_shows_badge() {
        let (mut store, persistence, indicator) = store();
        store.start("task-1", &sites(&["github.com"]));

        let status = store.status();
        assert!(status.is_active);
        let session = status.session.expect("session");
        assert_eq!(session.task_id, "task-1");
        assert_eq!(session.allowed_sites, sites(&["github.com"]));
        assert!(session.distractions.is_empty());

        assert_eq!(persistence.stored(), Some(session));
        assert_eq!(indicator.current(), Some(Badge::ACTIVE));
    }

    #[test]
    fn end_returns_to_idle_and_clears_everything() {
        let (mut store, persistence, indicator) = store();
        store.start("task-1", &sites(&["github.com"]));
        store.record_distraction("twitter.com", "https://twitter.com/");

        let ended = store.end().expect("ended session");
        assert_eq!(ended.task_id, "task-1");
        assert_eq!(ended.distraction_count, 1);
        assert!(ended.duration >= Duration::zero());

        let status = store.status();
        assert!(!status.is_active);
        assert!(status.session.is_none());
        assert!(persistence.stored().is_none());
        assert_eq!(indicator.current(), None);
    }

    #[test]
    fn end_while_idle_is_a_no_op() {
        let (mut store, _, _) = store();
        assert!(store.end().is_none());
        assert!(store.end().is_none());
        assert_eq!(store.status(), SessionStatus::idle());
    }

    #[test]
    fn second_start_replaces_first_session() {
        let (mut store, persistence, _) = store();
        store.start("task-1", &sites(&["github.com"]));
        store.record_distraction("twitter.com", "https://twitter.com/");

        store.start("task-2", &sites(&["react.dev"]));

        let session = store.status().session.expect("session");
        assert_eq!(session.task_id, "task-2");
        assert_eq!(session.allowed_sites, sites(&["react.dev"]));
        assert!(session.distractions.is_empty());
        assert_eq!(persistence.stored(), Some(session));
    }

    #[test]
    fn record_distraction_while_idle_changes_nothing() {
        let (mut store, persistence, _) = store();
        assert!(!store.record_distraction("twitter.com", "https://twitter.com/"));
        assert_eq!(store.status(), SessionStatus::idle());
        assert!(persistence.stored().is_none());
    }

    #[test]
    fn record_distraction_appends_and_persists() {
        let (mut store, persistence, _) = store();
        store.start("task-1", &[]);
        assert!(store.record_distraction("twitter.com", "https://twitter.com/"));
        assert!(store.record_distraction("reddit.com", "https://reddit.com/r/rust"));

        let session = store.current().expect("session").clone();
        let sites: Vec<&str> = session.distractions.iter().map(|d| d.site.as_str()).collect();
        assert_eq!(sites, vec!["twitter.com", "reddit.com"]);
        assert_eq!(persistence.stored(), Some(session));
    }

    #[test]
    fn restore_picks_up_persisted_session() {
        let (mut store, persistence, _) = store();
        store.start("task-1", &sites(&["github.com"]));
        store.record_distraction("twitter.com", "https://twitter.com/");
        let before = store.status();
        drop(store);

        let indicator = MemoryStatusIndicator::new();
        let mut restarted = SessionStore::new(persistence, indicator.clone());
        assert!(!restarted.is_active());
        assert!(restarted.restore());
        assert_eq!(restarted.status(), before);
        assert_eq!(indicator.current(), Some(Badge::ACTIVE));
    }

    #[test]
    fn restore_without_record_stays_idle() {
        let (mut store, _, indicator) = store();
        assert!(!store.restore());
        assert!(!store.is_active());
        assert_eq!(indicator.current(), None);
    }

    #[test]
    fn persistence_failure_does_not_block_state_change() {
        let (mut store, persistence, _) = store();
        persistence.set_fail_writes(true);

        store.start("task-1", &[]);
        assert!(store.is_active());
        assert!(store.record_distraction("twitter.com", "https://twitter.com/"));
        assert_eq!(store.current().map(|s| s.distractions.len()), Some(1));

        assert!(store.end().is_some());
        assert!(!store.is_active());
    }

    #[test]
    fn start_keeps_allow_list_as_given() {
        let (mut store, persistence, _) = store();
        store.start("task-1", &sites(&["GitHub.com", ""]));
        assert_eq!(store.allowed_sites(), &sites(&["GitHub.com", ""])[..]);
        assert_eq!(
            persistence.stored().map(|session| session.allowed_sites),
            Some(sites(&["GitHub.com", ""]))
        );

        store.start("task-2", &sites(&["react.dev", "react.dev"]));
        assert_eq!(store.allowed_sites(), &sites(&["react.dev"])[..]);
    }

    #[test]
    fn start_keeps_memory_when_persistence_fails() {
        let (mut store, persistence, indicator) = store();
        persistence.set_fail_writes(true);

        let session = store.start("task-1", &sites(&["github.com"])).clone();
        assert_eq!(store.current(), Some(&session));
        assert!(persistence.stored().is_none());
        assert_eq!(indicator.current(), Some(Badge::ACTIVE));
    }
}
