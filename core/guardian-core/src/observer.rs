//! Tab Activity Observer: reacts to "URL changed" and "tab activated".
//!
//! Stateless handlers over an injected [`SessionStore`] and
//! [`OverlayInjector`]. These fire on every navigation, so the idle path is a
//! single `is_active` check.
//!
//! Injection is fire-and-forget. Its `Result` is inspected here, logged, and
//! dropped: a closed tab or a protected page has no recovery action.

use focus_guardian_protocol::OverlayCommand;
use serde::Serialize;

use crate::indicator::StatusIndicator;
use crate::matcher::{extract_hostname, is_allowed};
use crate::persistence::SessionPersistence;
use crate::store::SessionStore;

/// Capability: render the blocking overlay in a specific tab.
pub trait OverlayInjector {
    fn render_overlay(&mut self, request: OverlayRequest) -> Result<(), InjectionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRequest {
    pub tab_id: u32,
    pub hostname: String,
    pub task_id: String,
    pub url: String,
}

impl From<OverlayRequest> for OverlayCommand {
    fn from(request: OverlayRequest) -> Self {
        OverlayCommand {
            tab_id: request.tab_id,
            hostname: request.hostname,
            task_id: request.task_id,
            url: request.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    #[error("tab {0} is closed")]
    TabClosed(u32),

    #[error("injection is forbidden on {url}")]
    Forbidden { url: String },

    #[error("injection unavailable: {0}")]
    Unavailable(String),
}

/// What the observer decided for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// No session, or the event carried no URL.
    Inactive,
    Allowed { hostname: Option<String> },
    Blocked { hostname: String, injected: bool },
}

/// A tab's URL changed. Events without a URL change are ignored.
pub fn on_tab_updated<P, I, J>(
    store: &mut SessionStore<P, I>,
    injector: &mut J,
    tab_id: u32,
    changed_url: Option<&str>,
) -> Verdict
where
    P: SessionPersistence,
    I: StatusIndicator,
    J: OverlayInjector,
{
    if !store.is_active() {
        return Verdict::Inactive;
    }
    match changed_url {
        Some(url) if !url.is_empty() => check_for_distraction(store, injector, tab_id, url),
        _ => Verdict::Inactive,
    }
}

/// A tab became the focused tab. Tabs whose URL is not known yet are ignored.
pub fn on_tab_activated<P, I, J>(
    store: &mut SessionStore<P, I>,
    injector: &mut J,
    tab_id: u32,
    tab_url: Option<&str>,
) -> Verdict
where
    P: SessionPersistence,
    I: StatusIndicator,
    J: OverlayInjector,
{
    if !store.is_active() {
        return Verdict::Inactive;
    }
    match tab_url {
        Some(url) if !url.is_empty() => check_for_distraction(store, injector, tab_id, url),
        _ => Verdict::Inactive,
    }
}

fn check_for_distraction<P, I, J>(
    store: &mut SessionStore<P, I>,
    injector: &mut J,
    tab_id: u32,
    url: &str,
) -> Verdict
where
    P: SessionPersistence,
    I: StatusIndicator,
    J: OverlayInjector,
{
    let hostname = extract_hostname(url);
    let allowed = match hostname.as_deref() {
        Some(host) => is_allowed(host, store.allowed_sites()),
        None => true,
    };
    tracing::debug!(tab_id, hostname = ?hostname, allowed, "Checked tab URL");

    let (hostname, task_id) = match (hostname, store.active_task_id()) {
        (Some(hostname), Some(task_id)) if !allowed => (hostname, task_id.to_string()),
        (hostname, _) => return Verdict::Allowed { hostname },
    };

    store.record_distraction(&hostname, url);

    let request = OverlayRequest {
        tab_id,
        hostname: hostname.clone(),
        task_id,
        url: url.to_string(),
    };
    let injected = match injector.render_overlay(request) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(tab_id, error = %err, "Could not inject focus overlay");
            false
        }
    };

    Verdict::Blocked { hostname, injected }
}
