//! Overlay Controller: the blocking prompt rendered inside a distracting tab.
//!
//! A controller is built fresh for every injection and owns only page-local
//! state: whether its prompt is visible, and one snooze deadline. It never
//! talks to the Session Store.
//!
//! ```text
//! inject ──> Visible ──snooze──> Snoozed{until} ──poll_snooze(now >= until)──> Visible
//!               │                                   (skipped if an overlay exists)
//!               └──back to work──> Visible (page navigates back)
//! ```
//!
//! The snooze re-render is unconditional: it does not check whether the
//! session is still active or the page is now allowed, and the timer is not
//! cancelled by navigation.

use std::time::{Duration, Instant};

/// Well-known element id; doubles as the idempotency key for injections.
pub const OVERLAY_ELEMENT_ID: &str = "flowstate-focus-overlay";
pub const BACK_TO_WORK_BUTTON_ID: &str = "flowstate-back-to-work";
pub const SNOOZE_BUTTON_ID: &str = "flowstate-snooze";
pub const SNOOZE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Capability: a page surface the overlay can be rendered into.
pub trait Surface {
    fn has_element(&self, id: &str) -> bool;
    fn mount(&mut self, view: &OverlayView);
    /// Returns whether an element was removed.
    fn remove_element(&mut self, id: &str) -> bool;
    fn navigate_back(&mut self);
}

/// The rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    pub hostname: String,
    pub task_id: String,
}

impl OverlayView {
    pub fn element_id(&self) -> &'static str {
        OVERLAY_ELEMENT_ID
    }

    /// Full-viewport markup. The hostname comes from an untrusted URL and is
    /// escaped.
    pub fn render_html(&self) -> String {
        format!(
            concat!(
                r#"<div id="{id}" data-task-id="{task}" style="position:fixed;top:0;left:0;width:100%;height:100%;"#,
                r#"background:rgba(0,0,0,0.95);z-index:999999;display:flex;align-items:center;justify-content:center;"#,
                r#"font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">"#,
                r#"<div style="background:white;padding:2rem;border-radius:1rem;text-align:center;max-width:400px;">"#,
                r#"<div style="font-size:24px;margin:0 auto 1rem;">⚡</div>"#,
                r#"<h2 style="margin:0 0 0.5rem;font-size:1.5rem;font-weight:600;color:#1f2937;">Still in Flow Session?</h2>"#,
                r#"<p style="margin:0 0 1.5rem;color:#6b7280;font-size:0.9rem;">You're currently focused on a task. "#,
                r#"<strong>{host}</strong> isn't on your allowed list.</p>"#,
                r#"<div style="display:flex;gap:0.75rem;justify-content:center;">"#,
                r#"<button id="{back}">Back to Work</button>"#,
                r#"<button id="{snooze}">Snooze 5min</button>"#,
                r#"</div></div></div>"#
            ),
            id = OVERLAY_ELEMENT_ID,
            task = escape_html(&self.task_id),
            host = escape_html(&self.hostname),
            back = BACK_TO_WORK_BUTTON_ID,
            snooze = SNOOZE_BUTTON_ID,
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChoice {
    BackToWork,
    Snooze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Visible,
    Snoozed { until: Instant },
    /// Snooze fired while another overlay was present; nothing left to do.
    Hidden,
}

pub struct OverlayController {
    view: OverlayView,
    state: OverlayState,
}

impl OverlayController {
    /// Renders the prompt, replacing any stale overlay already in the page.
    pub fn inject<S: Surface>(surface: &mut S, hostname: &str, task_id: &str) -> Self {
        if surface.remove_element(OVERLAY_ELEMENT_ID) {
            tracing::debug!(hostname, "Replaced stale focus overlay");
        }

        let view = OverlayView {
            hostname: hostname.to_string(),
            task_id: task_id.to_string(),
        };
        surface.mount(&view);
        Self {
            view,
            state: OverlayState::Visible,
        }
    }

    pub fn choose<S: Surface>(&mut self, surface: &mut S, choice: OverlayChoice, now: Instant) {
        match choice {
            OverlayChoice::BackToWork => surface.navigate_back(),
            OverlayChoice::Snooze => {
                if self.state != OverlayState::Visible {
                    return;
                }
                surface.remove_element(OVERLAY_ELEMENT_ID);
                self.state = OverlayState::Snoozed {
                    until: now + SNOOZE_DURATION,
                };
            }
        }
    }

    /// Drives the snooze timer. Returns whether the prompt was re-rendered.
    pub fn poll_snooze<S: Surface>(&mut self, surface: &mut S, now: Instant) -> bool {
        let OverlayState::Snoozed { until } = self.state else {
            return false;
        };
        if now < until {
            return false;
        }

        if surface.has_element(OVERLAY_ELEMENT_ID) {
            self.state = OverlayState::Hidden;
            return false;
        }
        surface.mount(&self.view);
        self.state = OverlayState::Visible;
        true
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn view(&self) -> &OverlayView {
        &self.view
    }
}

/// One element mounted into a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedElement {
    pub id: String,
    pub html: String,
}

/// In-memory page: an element list plus a back-navigation counter.
#[derive(Debug, Default)]
pub struct MemorySurface {
    elements: Vec<MountedElement>,
    back_navigations: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, id: &str) -> usize {
        self.elements.iter().filter(|el| el.id == id).count()
    }

    pub fn html(&self, id: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|el| el.id == id)
            .map(|el| el.html.as_str())
    }

    pub fn back_navigations(&self) -> usize {
        self.back_navigations
    }
}

impl Surface for MemorySurface {
    fn has_element(&self, id: &str) -> bool {
        self.elements.iter().any(|el| el.id == id)
    }

    fn mount(&mut self, view: &OverlayView) {
        self.elements.push(MountedElement {
            id: view.element_id().to_string(),
            html: view.render_html(),
        });
    }

    fn remove_element(&mut self, id: &str) -> bool {
        let before = self.elements.len();
        self.elements.retain(|el| el.id != id);
        self.elements.len() != before
    }

    fn navigate_back(&mut self) {
        self.back_navigations += 1;
    }
}
