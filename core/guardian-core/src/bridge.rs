//! Messaging Bridge: same-origin page messages in, session control out.
//!
//! The origin check in [`MessagingBridge::handle`] is the only trust boundary
//! of the guardian. A cross-origin message is dropped without any reply, so a
//! foreign frame cannot probe whether the guardian is installed.
//!
//! [`PageApi`] is the page-facing half: host code calls `start_session` /
//! `end_session` and never sees the message format.

use focus_guardian_protocol::{
    EndSessionPayload, PageMessage, PageMessageType, StartSessionPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message as observed by the page's message listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEvent {
    pub origin: String,
    pub data: Value,
}

/// Forwards session intents to the privileged side.
pub trait SessionRelay {
    fn start_session(&mut self, payload: StartSessionPayload) -> Result<(), RelayError>;
    fn end_session(&mut self, payload: EndSessionPayload) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("background process unavailable: {0}")]
    Unavailable(String),

    #[error("background process rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    Relayed(PageMessageType),
    RelayFailed(PageMessageType),
    /// Same origin, but not one of ours (or a malformed payload).
    Ignored,
    /// Cross-origin. Dropped silently.
    Rejected,
}

pub struct MessagingBridge<R> {
    page_origin: String,
    relay: R,
}

impl<R: SessionRelay> MessagingBridge<R> {
    pub fn new(page_origin: impl Into<String>, relay: R) -> Self {
        Self {
            page_origin: page_origin.into(),
            relay,
        }
    }

    pub fn page_origin(&self) -> &str {
        &self.page_origin
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn handle(&mut self, event: &PageEvent) -> BridgeOutcome {
        if event.origin != self.page_origin {
            tracing::trace!(origin = %event.origin, "Dropped cross-origin page message");
            return BridgeOutcome::Rejected;
        }

        let message: PageMessage = match serde_json::from_value(event.data.clone()) {
            Ok(message) => message,
            Err(_) => return BridgeOutcome::Ignored,
        };

        let kind = message.message_type;
        let result = match kind {
            PageMessageType::FlowSessionStart => {
                match serde_json::from_value::<StartSessionPayload>(message.payload) {
                    Ok(payload) => self.relay.start_session(payload),
                    Err(err) => {
                        tracing::debug!(error = %err, "Ignoring malformed session start payload");
                        return BridgeOutcome::Ignored;
                    }
                }
            }
            PageMessageType::FlowSessionEnd => {
                let payload = match message.payload {
                    Value::Null => EndSessionPayload::default(),
                    payload => serde_json::from_value(payload).unwrap_or_default(),
                };
                self.relay.end_session(payload)
            }
            PageMessageType::Other => return BridgeOutcome::Ignored,
        };

        match result {
            Ok(()) => BridgeOutcome::Relayed(kind),
            Err(err) => {
                tracing::warn!(message_type = ?kind, error = %err, "Failed to relay page message");
                BridgeOutcome::RelayFailed(kind)
            }
        }
    }
}

/// The page's `postMessage`.
pub trait PagePort {
    fn post_message(&mut self, data: Value, target_origin: &str);
}

/// Page-global API wrapping the message format.
pub struct PageApi<P> {
    origin: String,
    port: P,
}

impl<P: PagePort> PageApi<P> {
    pub fn new(origin: impl Into<String>, port: P) -> Self {
        Self {
            origin: origin.into(),
            port,
        }
    }

    pub fn start_session(&mut self, task_id: &str, allowed_sites: &[String]) {
        self.post(PageMessage::start(task_id, allowed_sites));
    }

    pub fn end_session(&mut self, session_id: Option<&str>) {
        self.post(PageMessage::end(session_id));
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    fn post(&mut self, message: PageMessage) {
        match serde_json::to_value(&message) {
            Ok(data) => self.port.post_message(data, &self.origin),
            Err(err) => tracing::warn!(error = %err, "Failed to encode page message"),
        }
    }
}
