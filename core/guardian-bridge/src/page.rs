//! Page-side plumbing for the CLI.
//!
//! `relay` feeds page events from a host (one JSON object per line) through
//! the Messaging Bridge. `start`/`end` act as the page itself: they call the
//! page API, whose posted messages loop back into a same-origin bridge.

use std::io::BufRead;

use guardian_core::{BridgeOutcome, MessagingBridge, PageEvent, PagePort, SessionRelay};
use serde_json::Value;

/// Delivers `postMessage` calls to a bridge listening on the same page.
pub struct LoopbackPort<R> {
    bridge: MessagingBridge<R>,
    last_outcome: Option<BridgeOutcome>,
}

impl<R: SessionRelay> LoopbackPort<R> {
    pub fn new(bridge: MessagingBridge<R>) -> Self {
        Self {
            bridge,
            last_outcome: None,
        }
    }

    pub fn last_outcome(&self) -> Option<BridgeOutcome> {
        self.last_outcome
    }
}

impl<R: SessionRelay> PagePort for LoopbackPort<R> {
    fn post_message(&mut self, data: Value, target_origin: &str) {
        // A page only hears its own messages when the target matches.
        if target_origin != self.bridge.page_origin() {
            self.last_outcome = None;
            return;
        }
        let event = PageEvent {
            origin: target_origin.to_string(),
            data,
        };
        self.last_outcome = Some(self.bridge.handle(&event));
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub relayed: usize,
    pub failed: usize,
    pub ignored: usize,
    pub rejected: usize,
    pub unreadable: usize,
}

/// Runs until `reader` is exhausted. Unreadable lines are skipped.
pub fn relay_events<B: BufRead, R: SessionRelay>(
    reader: B,
    bridge: &mut MessagingBridge<R>,
) -> std::io::Result<RelayStats> {
    let mut stats = RelayStats::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: PageEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(error = %err, "Skipping unreadable page event");
                stats.unreadable += 1;
                continue;
            }
        };

        match bridge.handle(&event) {
            BridgeOutcome::Relayed(kind) => {
                tracing::info!(message_type = ?kind, "Relayed page message");
                stats.relayed += 1;
            }
            BridgeOutcome::RelayFailed(_) => stats.failed += 1,
            BridgeOutcome::Ignored => stats.ignored += 1,
            BridgeOutcome::Rejected => stats.rejected += 1,
        }
    }

    Ok(stats)
}
