//! Overlay injection for hosts that pull their render commands.
//!
//! The daemon cannot reach into a page itself. The observer "injects" by
//! queueing a command for the tab; the host picks it up with `TAKE_OVERLAY`
//! and mounts the overlay. One pending command per tab: a newer violation
//! replaces the older one, matching the overlay's own replace-not-stack rule.

use std::collections::HashMap;

use focus_guardian_protocol::OverlayCommand;
use guardian_core::{InjectionError, OverlayInjector, OverlayRequest};
use url::Url;

const INJECTABLE_SCHEMES: [&str; 2] = ["http", "https"];

#[derive(Debug, Default)]
pub struct OverlayOutbox {
    pending: HashMap<u32, OverlayCommand>,
}

impl OverlayOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops whatever was queued for a tab that has gone away.
    pub fn discard(&mut self, tab_id: u32) {
        self.pending.remove(&tab_id);
    }

    pub fn take(&mut self, tab_id: u32) -> Option<OverlayCommand> {
        self.pending.remove(&tab_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl OverlayInjector for OverlayOutbox {
    fn render_overlay(&mut self, request: OverlayRequest) -> Result<(), InjectionError> {
        let injectable = Url::parse(&request.url)
            .map(|url| INJECTABLE_SCHEMES.contains(&url.scheme()))
            .unwrap_or(false);
        if !injectable {
            return Err(InjectionError::Forbidden { url: request.url });
        }

        tracing::debug!(tab_id = request.tab_id, hostname = %request.hostname, "Queued focus overlay");
        self.pending.insert(request.tab_id, request.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tab_id: u32, url: &str) -> OverlayRequest {
        OverlayRequest {
            tab_id,
            hostname: "twitter.com".to_string(),
            task_id: "task-1".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn queues_one_command_per_tab() {
        let mut outbox = OverlayOutbox::new();
        outbox.render_overlay(request(1, "https://twitter.com/")).unwrap();
        outbox.render_overlay(request(1, "https://twitter.com/home")).unwrap();

        assert_eq!(outbox.pending_count(), 1);
        let command = outbox.take(1).expect("command");
        assert_eq!(command.url, "https://twitter.com/home");
        assert!(outbox.take(1).is_none());
    }

    #[test]
    fn refuses_protected_pages() {
        let mut outbox = OverlayOutbox::new();
        let err = outbox
            .render_overlay(request(1, "chrome://settings/"))
            .unwrap_err();
        assert!(matches!(err, InjectionError::Forbidden { .. }));
        assert_eq!(outbox.pending_count(), 0);
    }

    #[test]
    fn closing_a_tab_drops_its_command() {
        let mut outbox = OverlayOutbox::new();
        outbox.render_overlay(request(3, "https://twitter.com/")).unwrap();
        outbox.render_overlay(request(4, "https://twitter.com/")).unwrap();
        outbox.discard(3);

        assert!(outbox.take(3).is_none());
        assert_eq!(outbox.pending_count(), 1);
        // Tab ids are reused by the browser; a later violation queues again.
        assert!(outbox.render_overlay(request(3, "https://twitter.com/")).is_ok());
        assert!(outbox.take(3).is_some());
    }

    #[test]
    fn closing_unknown_tabs_keeps_nothing() {
        let mut outbox = OverlayOutbox::new();
        for tab_id in 0..1000 {
            outbox.discard(tab_id);
        }
        assert_eq!(outbox.pending_count(), 0);
        assert_eq!(outbox.pending.capacity(), 0);
    }
}
